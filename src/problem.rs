//! Problem generation and answer checking.

use rand::Rng;

use crate::domain::{Level, Problem};

/// Draws both operands independently and uniformly from the level's
/// inclusive range. `min_range == max_range` yields a fixed operand.
pub fn generate_problem<R: Rng + ?Sized>(level: &Level, rng: &mut R) -> Problem {
  let (lo, hi) = (level.min_range, level.max_range.max(level.min_range));
  let operand1 = rng.gen_range(lo..=hi);
  let operand2 = rng.gen_range(lo..=hi);
  Problem { operand1, operand2, correct_answer: operand1 as i64 + operand2 as i64 }
}

/// True iff the leading integer of the trimmed input equals `expected`.
/// Anything after the digits is ignored, so "42abc" reads as 42 and "4.2"
/// as 4. Input with no leading digits is simply wrong, not an error.
pub fn validate_answer(input: &str, expected: i64) -> bool {
  leading_integer(input.trim()).map_or(false, |n| n == expected)
}

fn leading_integer(s: &str) -> Option<i64> {
  let unsigned = s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s);
  let digits = unsigned.len() - unsigned.trim_start_matches(|c: char| c.is_ascii_digit()).len();
  if digits == 0 {
    return None;
  }
  let sign_len = s.len() - unsigned.len();
  s[..sign_len + digits].parse().ok()
}
