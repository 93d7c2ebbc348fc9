//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Rounded percentage of correct answers; 0 when nothing was attempted.
pub fn accuracy_percent(correct: u64, total: u64) -> f64 {
  if total == 0 { return 0.0; }
  (correct as f64 / total as f64 * 100.0).round()
}

/// "42 min" under an hour, "1h 5m" above.
pub fn format_minutes(secs: u64) -> String {
  let minutes = secs / 60;
  if minutes < 60 {
    format!("{} min", minutes)
  } else {
    format!("{}h {}m", minutes / 60, minutes % 60)
  }
}

/// Log-safe truncation for large strings.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) { cut -= 1; }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}
