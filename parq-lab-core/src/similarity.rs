//! Close-match hints for mistyped column and table names, using the Ratcliff/Obershelp
//! "gestalt pattern matching" ratio.

pub const DEFAULT_CUTOFF: f64 = 0.6;

/// Similarity in `[0, 1]`: `2 * M / T` where `M` is the number of matched characters and `T`
/// the total number of characters in both strings.
pub fn ratio(a: &str, b: &str) -> f64 {
  let a: Vec<char> = a.chars().collect();
  let b: Vec<char> = b.chars().collect();
  let total = a.len() + b.len();
  if total == 0 {
    return 1.0;
  }
  2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Sum of the sizes of all matching blocks: take the longest common substring, then recurse
/// on the pieces to its left and to its right.
fn matching_characters(a: &[char], b: &[char]) -> usize {
  let mut matched = 0;
  let mut pending = vec![(0, a.len(), 0, b.len())];
  while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
    let (i, j, size) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
    if size == 0 {
      continue;
    }
    matched += size;
    if a_lo < i && b_lo < j {
      pending.push((a_lo, i, b_lo, j));
    }
    if i + size < a_hi && j + size < b_hi {
      pending.push((i + size, a_hi, j + size, b_hi));
    }
  }
  matched
}

/// Longest block with `a[i..i+size] == b[j..j+size]` inside the given bounds. Ties go to the
/// block starting earliest in `a`, then earliest in `b`.
fn longest_match(
  a: &[char],
  b: &[char],
  a_lo: usize,
  a_hi: usize,
  b_lo: usize,
  b_hi: usize,
) -> (usize, usize, usize) {
  let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);
  // lengths[j + 1] is the length of the match ending at a[i - 1], b[j]
  let mut lengths = vec![0usize; b.len() + 1];
  for i in a_lo..a_hi {
    let mut next = vec![0usize; b.len() + 1];
    for j in b_lo..b_hi {
      if a[i] == b[j] {
        let size = lengths[j] + 1;
        next[j + 1] = size;
        if size > best_size {
          best_i = i + 1 - size;
          best_j = j + 1 - size;
          best_size = size;
        }
      }
    }
    lengths = next;
  }
  (best_i, best_j, best_size)
}

/// Up to `n` candidates whose ratio with `word` is at least `cutoff`, best first.
pub fn close_matches<'a, I>(word: &str, candidates: I, n: usize, cutoff: f64) -> Vec<String>
where
  I: IntoIterator<Item = &'a str>,
{
  let mut scored: Vec<(f64, &str)> = candidates
    .into_iter()
    .map(|candidate| (ratio(word, candidate), candidate))
    .filter(|(score, _)| *score >= cutoff)
    .collect();
  scored.sort_by(|(s1, c1), (s2, c2)| s2.total_cmp(s1).then_with(|| c2.cmp(c1)));
  scored
    .into_iter()
    .take(n)
    .map(|(_, candidate)| candidate.to_string())
    .collect()
}

/// The single best close match with the default cutoff, used for "Did you mean" hints.
pub fn best_match<'a, I>(word: &str, candidates: I) -> Option<String>
where
  I: IntoIterator<Item = &'a str>,
{
  close_matches(word, candidates, 1, DEFAULT_CUTOFF)
    .into_iter()
    .next()
}

#[cfg(test)]
mod tests {
  use rstest::rstest;

  use super::*;

  #[rstest]
  #[case("abcd", "bcde", 0.75)]
  #[case("Year", "Year", 1.0)]
  #[case("Year", "xxxx", 0.0)]
  #[case("", "", 1.0)]
  fn test_ratio(#[case] a: &str, #[case] b: &str, #[case] expected: f64) {
    assert!((ratio(a, b) - expected).abs() < 1e-9);
  }

  #[test]
  fn test_ratio_recurses_left_of_longest_block() {
    // "aby" is matched first, then "x" on its left
    assert!((ratio("xaby", "xqaby") - 8.0 / 9.0).abs() < 1e-9);
  }

  #[test]
  fn test_close_matches_order_and_cutoff() {
    let words = ["ape", "apple", "peach", "puppy"];
    assert_eq!(vec!["apple", "ape"], close_matches("appel", words, 3, 0.6));
    assert!(close_matches("zzz", words, 3, 0.6).is_empty());
  }

  #[test]
  fn test_best_match() {
    let columns = ["Year", "Month", "Carrier"];
    assert_eq!(Some("Year".to_string()), best_match("year", columns));
    assert_eq!(Some("Carrier".to_string()), best_match("Carier", columns));
    assert_eq!(None, best_match("DepDelay", columns));
  }
}
