//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Normalize a free-text answer for the local comparison fallback:
/// trimmed and case-folded, with internal whitespace runs collapsed.
pub fn normalize_answer(s: &str) -> String {
  s.split_whitespace()
    .map(|w| w.to_lowercase())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
#[allow(dead_code)]
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max { s.to_string() } else { format!("{}… ({} bytes total)", &s[..max], s.len()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_fills_all_keys() {
    let out = fill_template("CEFR {cefr}, topic {topic}", &[("cefr", "B1"), ("topic", "Wetter")]);
    assert_eq!(out, "CEFR B1, topic Wetter");
  }

  #[test]
  fn answer_normalization_folds_case_and_whitespace() {
    assert_eq!(normalize_answer("  Ich   GEHE nach Hause "), "ich gehe nach hause");
    assert_eq!(normalize_answer("Straße"), "straße");
  }
}
