use shell_core::error::ShellError;

/// Standard tapscript leaf version.
pub const TAPROOT_LEAF_TAPSCRIPT: u8 = 0xc0;

/// Shell-extended tapscript leaf version (settlement opcodes permitted).
pub const TAPROOT_LEAF_SHELL: u8 = 0xc2;

/// Mask clearing the output-key parity bit of a control byte.
const TAPROOT_LEAF_MASK: u8 = 0xfe;

/// Annex prefix byte (an optional final witness element).
const ANNEX_PREFIX: u8 = 0x50;

const CONTROL_BASE_SIZE: usize = 33;
const CONTROL_NODE_SIZE: usize = 32;
const CONTROL_MAX_NODES: usize = 128;

/// Validate the structure of a taproot witness stack.
///
/// A key-path spend is a single signature item. A script-path spend ends in
/// a control block whose leaf version must be one of the two recognized
/// versions; the optional annex is stripped first.
pub fn validate_taproot_witness(witness: &[Vec<u8>]) -> Result<(), ShellError> {
    if witness.is_empty() {
        return Err(ShellError::InvalidScript("empty taproot witness".into()));
    }

    let mut items = witness;
    if items.len() >= 2 {
        if let Some(last) = items.last() {
            if last.first() == Some(&ANNEX_PREFIX) {
                items = &items[..items.len() - 1];
            }
        }
    }

    // Key-path spend: a single 64- or 65-byte signature.
    if items.len() == 1 {
        let sig_len = items[0].len();
        if sig_len == 64 || sig_len == 65 {
            return Ok(());
        }
        return Err(ShellError::InvalidScript(format!(
            "key-path signature must be 64 or 65 bytes, got {sig_len}"
        )));
    }

    let control = items.last().expect("length checked above");
    if control.len() < CONTROL_BASE_SIZE
        || (control.len() - CONTROL_BASE_SIZE) % CONTROL_NODE_SIZE != 0
        || (control.len() - CONTROL_BASE_SIZE) / CONTROL_NODE_SIZE > CONTROL_MAX_NODES
    {
        return Err(ShellError::InvalidScript(format!(
            "control block has invalid length {}",
            control.len()
        )));
    }

    let leaf_version = control[0] & TAPROOT_LEAF_MASK;
    if leaf_version != TAPROOT_LEAF_TAPSCRIPT && leaf_version != TAPROOT_LEAF_SHELL {
        return Err(ShellError::UnknownLeafVersion(leaf_version));
    }
    Ok(())
}
