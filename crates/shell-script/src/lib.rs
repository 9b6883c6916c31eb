//! shell-script
//!
//! Recognition of the six settlement opcodes, typed extraction of their
//! witness parameters, claim-predicate evaluation, and taproot witness
//! structure validation.

pub mod opcodes;
pub mod predicate;
pub mod taproot;

pub use opcodes::{
    classify_input, extract_operations, parse_operation, ChannelCloseParams, ChannelOpenParams,
    ChannelUpdateParams, ClaimableClaimParams, ClaimableCreateParams, DocumentHashParams,
    SettlementOp, SettlementOpcode,
};
pub use predicate::Predicate;
pub use taproot::{validate_taproot_witness, TAPROOT_LEAF_SHELL, TAPROOT_LEAF_TAPSCRIPT};
