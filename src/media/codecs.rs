use super::CodecCapability;

/// Retransmission, redundancy and FEC payloads. Kept available but never preferred.
pub const UTILITY_CODECS: [&str; 3] = ["RTX", "RED", "ULPFEC"];

/// Order `codecs` as preferred, then other media codecs, then utility codecs.
///
/// Relative order inside each group is preserved and names compare case-insensitively,
/// so applying the ordering twice gives the same list.
#[must_use]
pub fn order_codecs(codecs: &[CodecCapability], preferred: &str) -> Vec<CodecCapability> {
    let mut preferred_codecs = Vec::new();
    let mut other_codecs = Vec::new();
    let mut utility_codecs = Vec::new();

    for codec in codecs {
        if codec.name.eq_ignore_ascii_case(preferred) {
            preferred_codecs.push(codec.clone());
        } else if UTILITY_CODECS.iter().any(|utility| codec.name.eq_ignore_ascii_case(utility)) {
            utility_codecs.push(codec.clone());
        } else {
            other_codecs.push(codec.clone());
        }
    }

    preferred_codecs.extend(other_codecs);
    preferred_codecs.extend(utility_codecs);
    preferred_codecs
}
