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

/// Remove angle brackets from free-text user input before it reaches
/// prompts or storage.
pub fn strip_angle_brackets(s: &str) -> String {
  s.chars().filter(|c| *c != '<' && *c != '>').collect()
}

/// Whitespace-separated word count, used for `word_count_observed`.
pub fn count_words(s: &str) -> usize {
  s.split_whitespace().count()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    s.to_string()
  } else {
    let cut = s
      .char_indices()
      .take_while(|(i, _)| *i < max)
      .last()
      .map(|(i, c)| i + c.len_utf8())
      .unwrap_or(0);
    format!("{}… ({} bytes total)", &s[..cut], s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_occurrences() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn strip_angle_brackets_keeps_other_text() {
    assert_eq!(strip_angle_brackets("a <b> c"), "a b c");
    assert_eq!(strip_angle_brackets("plain"), "plain");
  }

  #[test]
  fn count_words_splits_on_whitespace() {
    assert_eq!(count_words("one  two\nthree"), 3);
    assert_eq!(count_words(""), 0);
  }

  #[test]
  fn trunc_for_log_is_char_boundary_safe() {
    let s = "héllo wörld, this is a long line";
    let t = trunc_for_log(s, 8);
    assert!(t.contains("bytes total"));
    assert_eq!(trunc_for_log("short", 100), "short");
  }
}
