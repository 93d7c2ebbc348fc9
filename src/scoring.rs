//! Points, currency and withdrawal eligibility.

/// Consecutive correct answers per streak bonus.
pub const STREAK_BONUS_EVERY: u32 = 5;

/// `floor(base * multiplier)` when `streak` is a positive multiple of
/// `STREAK_BONUS_EVERY`, otherwise `base`.
pub fn compute_points(base_points: u32, streak: u32, streak_multiplier: f64) -> u32 {
  if streak > 0 && streak % STREAK_BONUS_EVERY == 0 {
    (base_points as f64 * streak_multiplier).floor() as u32
  } else {
    base_points
  }
}

/// Always derived from the cumulative score, never accumulated.
pub fn points_to_currency(total_score: u64, conversion_rate: f64) -> u64 {
  (total_score as f64 * conversion_rate).floor() as u64
}

pub fn can_withdraw(balance: u64, minimum_withdrawal: u64) -> bool {
  balance >= minimum_withdrawal
}
