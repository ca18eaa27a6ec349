//! Rewriting user input into the expression language.
//!
//! LaTeX mode understands the handful of commands people paste from lab
//! reports (`\frac`, `\sqrt`, `\cdot`, ...). Both modes then insert implicit
//! multiplication: `2x` becomes `2*x` and `)(` becomes `)*(`.

use crate::expr::Function;

/// Nested `\frac`/`\sqrt` groups deeper than this are left unexpanded.
const MAX_LATEX_DEPTH: usize = 64;

pub fn normalize(input: &str, is_latex: bool) -> String {
    let text = if is_latex {
        expand_latex(strip_delimiters(input), 0)
    } else {
        input.to_string()
    };
    insert_implicit_multiplication(&text)
}

fn strip_delimiters(s: &str) -> &str {
    let s = s.trim();
    let inner = if s.len() >= 4 && s.starts_with("$$") && s.ends_with("$$") {
        &s[2..s.len() - 2]
    } else if s.len() >= 2 && s.starts_with('$') && s.ends_with('$') {
        &s[1..s.len() - 1]
    } else {
        s
    };
    inner.trim()
}

/// Contents of the group opening at `start` and the index after its closer.
fn take_group(chars: &[char], start: usize, open: char, close: char) -> Option<(String, usize)> {
    if chars.get(start) != Some(&open) {
        return None;
    }
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(start) {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((chars[start + 1..i].iter().collect(), i + 1));
            }
        }
    }
    None
}

fn skip_spaces(chars: &[char], mut i: usize) -> usize {
    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    i
}

fn expand_latex(src: &str, depth: usize) -> String {
    if depth > MAX_LATEX_DEPTH {
        return src.to_string();
    }
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let start = i + 1;
                let mut end = start;
                while chars.get(end).is_some_and(|c| c.is_ascii_alphabetic()) {
                    end += 1;
                }
                let command: String = chars[start..end].iter().collect();
                i = expand_command(&command, &chars, end, depth, &mut out);
            }
            '{' => {
                out.push('(');
                i += 1;
            }
            '}' => {
                out.push(')');
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Expand `\command` whose arguments start at `i`; returns the resume index.
fn expand_command(
    command: &str,
    chars: &[char],
    i: usize,
    depth: usize,
    out: &mut String,
) -> usize {
    let inner = |s: &str| expand_latex(s, depth + 1);
    match command {
        "frac" => {
            let a = take_group(chars, skip_spaces(chars, i), '{', '}');
            if let Some((num, after)) = a {
                if let Some((den, end)) = take_group(chars, skip_spaces(chars, after), '{', '}') {
                    out.push_str(&format!("(({})/({}))", inner(&num), inner(&den)));
                    return end;
                }
            }
            out.push_str("\\frac");
            i
        }
        "sqrt" => {
            let j = skip_spaces(chars, i);
            if let Some((index, after)) = take_group(chars, j, '[', ']') {
                if let Some((radicand, end)) = take_group(chars, skip_spaces(chars, after), '{', '}') {
                    out.push_str(&format!(
                        "(({})^(1/({})))",
                        inner(&radicand),
                        inner(&index)
                    ));
                    return end;
                }
            } else if let Some((radicand, end)) = take_group(chars, j, '{', '}') {
                out.push_str(&format!("sqrt({})", inner(&radicand)));
                return end;
            }
            out.push_str("sqrt");
            i
        }
        "cdot" | "times" => {
            out.push('*');
            i
        }
        "div" => {
            out.push('/');
            i
        }
        "pm" => {
            out.push('+');
            i
        }
        "left" | "right" => i,
        "pi" => {
            out.push_str("pi");
            i
        }
        name if Function::from_name(name).is_some() => {
            out.push_str(name);
            i
        }
        // `\,` `\;` `\!` spacing
        "" if matches!(chars.get(i), Some(',' | ';' | '!' | ' ')) => {
            out.push(' ');
            i + 1
        }
        other => {
            // Leave it for the parser to reject with a position.
            out.push('\\');
            out.push_str(other);
            i
        }
    }
}

/// `e`/`E` at `k` starts an exponent (`1e-3`, `2E5`).
fn exponent_at(chars: &[char], k: usize) -> bool {
    if !matches!(chars.get(k), Some('e' | 'E')) {
        return false;
    }
    match chars.get(k + 1) {
        Some(c) if c.is_ascii_digit() => true,
        Some('+' | '-') => chars.get(k + 2).is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn insert_implicit_multiplication(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            while chars.get(i).is_some_and(|d| d.is_ascii_digit() || *d == '.') {
                out.push(chars[i]);
                i += 1;
            }
            if exponent_at(&chars, i) {
                out.push(chars[i]);
                i += 1;
                if matches!(chars.get(i), Some('+' | '-')) {
                    out.push(chars[i]);
                    i += 1;
                }
                while chars.get(i).is_some_and(|d| d.is_ascii_digit()) {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            if chars.get(i).is_some_and(|d| d.is_alphabetic()) {
                out.push('*');
            }
        } else if c.is_alphabetic() || c == '_' {
            while chars.get(i).is_some_and(|d| d.is_alphanumeric() || *d == '_') {
                out.push(chars[i]);
                i += 1;
            }
        } else if c == ')' {
            out.push(c);
            let j = skip_spaces(&chars, i + 1);
            if chars.get(j) == Some(&'(') {
                out.push('*');
                i = j;
            } else {
                i += 1;
            }
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_inserts_implicit_products() {
        assert_eq!(normalize("2x + 3y", false), "2*x + 3*y");
        assert_eq!(normalize("(a+b) (c)", false), "(a+b)*(c)");
        assert_eq!(normalize("x2 + 4", false), "x2 + 4");
        assert_eq!(normalize("log10(x)", false), "log10(x)");
    }

    #[test]
    fn scientific_notation_is_left_alone() {
        assert_eq!(normalize("1e-3*x + 2.5E+4", false), "1e-3*x + 2.5E+4");
        assert_eq!(normalize("1e3x", false), "1e3*x");
        assert_eq!(normalize("2e", false), "2*e");
    }

    #[test]
    fn latex_fractions_and_roots() {
        assert_eq!(normalize(r"$\frac{a}{b}$", true), "((a)/(b))");
        assert_eq!(normalize(r"\frac{\frac{1}{x}}{2}", true), "((((1)/(x)))/(2))");
        assert_eq!(normalize(r"\sqrt{x^2+1}", true), "sqrt(x^2+1)");
        assert_eq!(normalize(r"\sqrt[3]{x}", true), "((x)^(1/(3)))");
    }

    #[test]
    fn latex_operators_and_functions() {
        assert_eq!(normalize(r"$$a \cdot b \times c \div d$$", true), "a * b * c / d");
        assert_eq!(normalize(r"\left(x \pm y\right)", true), "(x + y)");
        assert_eq!(normalize(r"2\pi r", true), "2*pi r");
        assert_eq!(normalize(r"\sin{x}^{2}", true), "sin(x)^(2)");
    }

    #[test]
    fn unknown_commands_survive_for_the_parser() {
        assert_eq!(normalize(r"\alpha + 1", true), r"\alpha + 1");
    }

    #[test]
    fn deeply_nested_fractions_stop_expanding() {
        let n = 5_000;
        let src = format!("{}x{}", r"\frac{1}{".repeat(n), "}".repeat(n));
        let out = normalize(&src, true);
        assert!(out.contains(r"\frac"));
        assert!(out.starts_with("((1)/(((1)/("));
    }
}
