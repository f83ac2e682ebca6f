/// Scores are always reported out of this value, for every dialect.
pub const MAX_SCORE: u8 = 100;

pub const MIN_SCORE: u8 = 1;

const BASE: i64 = 50;
const DENY_ALL_BONUS: i64 = 20;
const NO_POLICIES_PENALTY: i64 = 20;

/// Computes the heuristic security score for a scan.
///
/// Starts from 50, adds 20 when deny-all coverage is established (or
/// subtracts 20 when no policies exist at all), subtracts one point per
/// distinct unprotected pod, and clamps the result to `[1, 100]`.
pub fn score(has_any_policies: bool, has_deny_all_coverage: bool, unprotected: usize) -> u8 {
    let mut score = BASE;
    if has_deny_all_coverage {
        score += DENY_ALL_BONUS;
    } else if !has_any_policies {
        score -= NO_POLICIES_PENALTY;
    }

    let unprotected = i64::try_from(unprotected).unwrap_or(i64::MAX);
    score = score.saturating_sub(unprotected);

    score.clamp(MIN_SCORE.into(), MAX_SCORE.into()) as u8
}
