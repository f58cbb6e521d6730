//! Shell-style name patterns (`*` and `?`) used to select library materials.

/// Default material selection when no pattern is given.
pub const DEFAULT_MATERIAL_PATTERN: &str = "MAT_*";

/// Match `name` against a pattern where `*` matches any run of characters
/// and `?` matches exactly one. Matching is case-sensitive.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_ni = 0usize;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            star_ni = ni;
            pi += 1;
        } else if let Some(s) = star {
            // backtrack: let the last star absorb one more character
            pi = s + 1;
            star_ni += 1;
            ni = star_ni;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// True if `name` matches any of `patterns`. An empty list falls back to `MAT_*`.
pub fn matches_any<S: AsRef<str>>(patterns: &[S], name: &str) -> bool {
    if patterns.is_empty() {
        return glob_match(DEFAULT_MATERIAL_PATTERN, name);
    }
    patterns.iter().any(|p| glob_match(p.as_ref(), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_basics() {
        assert!(glob_match("MAT_*", "MAT_Plastic_Black"));
        assert!(glob_match("MAT_*_Black", "MAT_Plastic_Black"));
        assert!(glob_match("MAT_Steel_?olished", "MAT_Steel_Polished"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("MAT_*", "mat_plastic"));
        assert!(!glob_match("MAT_?", "MAT_"));
        assert!(glob_match("*Alum*Matte", "MAT_Aluminum_Cast_Matte"));
    }

    #[test]
    fn test_matches_any_defaults() {
        let none: [&str; 0] = [];
        assert!(matches_any(&none, "MAT_Rubber_Black"));
        assert!(!matches_any(&none, "Material.001"));
        assert!(matches_any(&["FOO", "MAT_Paint_*"], "MAT_Paint_Red_Gloss"));
        assert!(!matches_any(&["MAT_Paint_*"], "MAT_Rubber_Black"));
    }
}
