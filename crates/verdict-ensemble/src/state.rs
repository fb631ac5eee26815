//! Connection-state normalization
//!
//! Flow exporters disagree on how to describe a connection's state:
//! Suricata uses words (`new`, `established`, `closed`), Argus emits
//! bidirectional flag summaries (`SA_SA`, `PA_PA`, `S_RA`), and Zeek
//! uses conn-state mnemonics (`S0`, `SF`, `REJ`). `classify` folds all
//! three dialects into [`CanonicalState`]. The tier order is load
//! bearing: it encodes compatibility with three independent upstream
//! formats and must not be rearranged.

use verdict_common::CanonicalState;

/// Zeek conn states that never completed a handshake
const ZEEK_NOT_ESTABLISHED: [&str; 6] = ["S0", "REJ", "RSTOS0", "RSTRH", "SH", "SHR"];

/// Zeek conn states with an established connection at some point
const ZEEK_ESTABLISHED: [&str; 7] = ["S1", "SF", "S2", "S3", "RSTO", "RSTP", "OTH"];

/// Normalize a raw exporter state token into a canonical state
///
/// Total over all inputs: unrecognized tokens fall through the dialect
/// tiers to `NotEstablished`, a blank token is `Undetermined`, and the
/// function never errors. `packets` disambiguates single-token
/// `RST`/`FIN` states, where the OS-level retry count (3) separates
/// answered connections from unanswered ones.
pub fn classify(raw_state: &str, packets: u64) -> CanonicalState {
    let raw = raw_state.trim();
    if raw.is_empty() {
        return CanonicalState::Undetermined;
    }

    // Tier 1: Suricata state words. Case-sensitive on purpose, the
    // uppercase dialects below reuse some of the same letters.
    if raw.contains("new") || raw.contains("established") {
        return CanonicalState::Established;
    }
    if raw.contains("closed") {
        return CanonicalState::NotEstablished;
    }

    let mut parts = raw.splitn(2, '_');
    let pre = parts.next().unwrap_or(raw);
    let suf = parts.next();

    // Tier 2: flag combinations. SYN+ACK seen in both directions, or
    // data pushed both ways, means the handshake completed even if the
    // flow was exported mid-connection.
    if let Some(suf) = suf {
        if pre.contains('S') && pre.contains('A') && suf.contains('S') && suf.contains('A') {
            return CanonicalState::Established;
        }
        if pre.contains("PA") && suf.contains("PA") {
            return CanonicalState::Established;
        }
    }

    // Zeek conn states match as plain substrings; RSTOS0 before RSTO
    // matters, so the not-established set is checked first.
    if ZEEK_NOT_ESTABLISHED.iter().any(|t| raw.contains(t)) {
        return CanonicalState::NotEstablished;
    }
    if ZEEK_ESTABLISHED.iter().any(|t| raw.contains(t)) {
        return CanonicalState::Established;
    }

    if suf.is_some() {
        // ICMP summaries keep their own canonical states when the
        // exporter reported both directions.
        if pre.contains("ECO") {
            return CanonicalState::IcmpEcho;
        }
        if pre.contains("ECR") {
            return CanonicalState::IcmpReply;
        }
        if pre.contains("URH") {
            return CanonicalState::IcmpHostUnreachable;
        }
        if pre.contains("URP") {
            return CanonicalState::IcmpPortUnreachable;
        }
        // Any other bidirectional summary (S_RA, S_R, FA_FA, ...) is a
        // connection attempt that never completed.
        return CanonicalState::NotEstablished;
    }

    // Tier 3: single-token states, one direction only.
    if pre.contains("ECO") || pre.contains("UNK") || pre.contains("CON") || pre.contains("EST") {
        return CanonicalState::Established;
    }
    if pre.contains("INT") {
        return CanonicalState::NotEstablished;
    }
    if pre.contains("RST") || pre.contains("FIN") {
        // Without both directions we guess from volume: up to 3 packets
        // is within the OS retry budget for an unanswered connection.
        return if packets > 3 {
            CanonicalState::Established
        } else {
            CanonicalState::NotEstablished
        };
    }

    CanonicalState::NotEstablished
}
