//! LaTeX subset to Unicode text.
//!
//! Covers what answers to homework-style questions actually use: Greek,
//! operators and relations, arrows, scripts, fractions, roots, text runs,
//! sized delimiters, accents and simple matrix environments. Anything else
//! is an error so the caller can fall back to the literal source.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesetError {
    #[error("unknown command \\{0}")]
    UnknownCommand(String),
    #[error("unbalanced braces")]
    UnbalancedBraces,
    #[error("missing argument for {0}")]
    MissingArgument(String),
}

pub fn typeset(latex: &str) -> Result<String, TypesetError> {
    let chars: Vec<char> = latex.chars().collect();
    let mut parser = Parser { chars: &chars, pos: 0, depth: 0 };
    let raw = parser.sequence(false)?;
    Ok(tidy(&raw))
}

/// Deepest group or command nesting accepted before giving up.
const MAX_NESTING: usize = 64;

struct Parser<'a> {
    chars: &'a [char],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TypesetError>,
    ) -> Result<T, TypesetError> {
        if self.depth >= MAX_NESTING {
            return Err(TypesetError::UnbalancedBraces);
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Elements up to the end of input, or up to the closing brace of the
    /// current group.
    fn sequence(&mut self, in_group: bool) -> Result<String, TypesetError> {
        if in_group { self.nested(|p| p.elements(true)) } else { self.elements(false) }
    }

    fn elements(&mut self, in_group: bool) -> Result<String, TypesetError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '}' {
                if in_group {
                    self.pos += 1;
                    return Ok(out);
                }
                return Err(TypesetError::UnbalancedBraces);
            }
            let piece = self.element()?;
            out.push_str(&piece);
        }
        if in_group { Err(TypesetError::UnbalancedBraces) } else { Ok(out) }
    }

    fn element(&mut self) -> Result<String, TypesetError> {
        let Some(c) = self.bump() else {
            return Ok(String::new());
        };
        Ok(match c {
            '{' => self.sequence(true)?,
            '}' => return Err(TypesetError::UnbalancedBraces),
            '\\' => self.command()?,
            '^' => superscript(&self.argument("^")?),
            '_' => subscript(&self.argument("_")?),
            '&' | '~' => " ".to_string(),
            '\'' => "′".to_string(),
            '-' => "−".to_string(),
            c if c.is_whitespace() => " ".to_string(),
            c => c.to_string(),
        })
    }

    /// Argument of a script or command: a group, a command or one character.
    fn argument(&mut self, owner: &str) -> Result<String, TypesetError> {
        self.skip_spaces();
        match self.bump() {
            Some('{') => self.sequence(true),
            Some('\\') => self.command(),
            Some('-') => Ok("−".to_string()),
            Some('}') | None => Err(TypesetError::MissingArgument(owner.to_string())),
            Some(c) => Ok(c.to_string()),
        }
    }

    /// Verbatim argument for text-mode commands and environment names.
    fn text_argument(&mut self, owner: &str) -> Result<String, TypesetError> {
        self.skip_spaces();
        match self.bump() {
            Some('{') => {
                let mut depth = 1;
                let mut out = String::new();
                while let Some(c) = self.bump() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(out);
                            }
                        }
                        _ => {}
                    }
                    out.push(c);
                }
                Err(TypesetError::UnbalancedBraces)
            }
            Some('}') | None => Err(TypesetError::MissingArgument(owner.to_string())),
            Some(c) => Ok(c.to_string()),
        }
    }

    fn command(&mut self) -> Result<String, TypesetError> {
        self.nested(Self::command_body)
    }

    fn command_body(&mut self) -> Result<String, TypesetError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        if self.pos == start {
            return self.control_symbol();
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        match name.as_str() {
            "frac" | "dfrac" | "tfrac" | "cfrac" => {
                let num = self.argument(&name)?;
                let den = self.argument(&name)?;
                Ok(format!("{}/{}", group(&num), group(&den)))
            }
            "binom" | "dbinom" | "tbinom" => {
                let n = self.argument(&name)?;
                let k = self.argument(&name)?;
                Ok(format!("C({}, {})", n, k))
            }
            "sqrt" => self.root(),
            "text" | "textrm" | "textnormal" | "textbf" | "textit" | "texttt" | "textsf" | "mbox" => {
                self.text_argument(&name)
            }
            "mathrm" | "mathbf" | "mathit" | "mathsf" | "mathtt" | "mathcal" | "boldsymbol" | "bm"
            | "operatorname" => self.argument(&name),
            "mathbb" => Ok(blackboard(&self.argument(&name)?)),
            "left" | "right" | "big" | "Big" | "bigg" | "Bigg" | "bigl" | "bigr" | "Bigl" | "Bigr" | "biggl"
            | "biggr" => self.sized_delimiter(&name),
            "displaystyle" | "textstyle" | "scriptstyle" | "limits" | "nolimits" | "nonumber" | "notag" => {
                Ok(String::new())
            }
            "begin" => {
                let env = self.text_argument(&name)?;
                if env == "array" {
                    // column spec
                    self.text_argument(&env)?;
                }
                Ok(environment_open(&env).to_string())
            }
            "end" => {
                let env = self.text_argument(&name)?;
                Ok(environment_close(&env).to_string())
            }
            "pmod" => Ok(format!(" (mod {})", self.argument(&name)?)),
            "bmod" | "mod" => Ok(" mod ".to_string()),
            "not" => Ok(negate(&self.argument(&name)?)),
            _ => {
                if let Some((mark, per_char)) = accent(&name) {
                    let base = self.argument(&name)?;
                    return Ok(apply_accent(&base, mark, per_char));
                }
                if FUNCTIONS.contains(&name.as_str()) {
                    let spaced = self.peek().is_some_and(|c| c.is_alphanumeric() || c == '\\');
                    return Ok(if spaced { format!("{} ", name) } else { name });
                }
                symbol(&name).map(str::to_string).ok_or_else(|| TypesetError::UnknownCommand(name.clone()))
            }
        }
    }

    /// `\` followed by a single non-letter.
    fn control_symbol(&mut self) -> Result<String, TypesetError> {
        let Some(c) = self.bump() else {
            return Err(TypesetError::MissingArgument("\\".to_string()));
        };
        match c {
            ',' | ':' | ';' | '>' | ' ' => Ok(" ".to_string()),
            '!' => Ok(String::new()),
            '\\' => Ok("\n".to_string()),
            '{' | '}' | '%' | '$' | '_' | '&' | '#' => Ok(c.to_string()),
            '|' => Ok("‖".to_string()),
            other => Err(TypesetError::UnknownCommand(other.to_string())),
        }
    }

    fn root(&mut self) -> Result<String, TypesetError> {
        self.skip_spaces();
        let mut index = None;
        if self.peek() == Some('[') {
            self.pos += 1;
            let mut n = String::new();
            loop {
                match self.peek() {
                    Some(']') => {
                        self.pos += 1;
                        break;
                    }
                    Some('}') => return Err(TypesetError::UnbalancedBraces),
                    Some(_) => n.push_str(&self.element()?),
                    None => return Err(TypesetError::MissingArgument("sqrt".to_string())),
                }
            }
            index = Some(n);
        }
        let radicand = self.argument("sqrt")?;
        let sign = match index.as_deref().map(str::trim) {
            None | Some("2") => "√".to_string(),
            Some("3") => "∛".to_string(),
            Some("4") => "∜".to_string(),
            Some(n) => format!("{}√", map_script(n, superscript_char).unwrap_or_else(|| n.to_string())),
        };
        Ok(format!("{}{}", sign, group(&radicand)))
    }

    /// Delimiter after `\left`, `\right` or a size command. `.` is empty.
    fn sized_delimiter(&mut self, owner: &str) -> Result<String, TypesetError> {
        self.skip_spaces();
        match self.peek() {
            Some('.') => {
                self.pos += 1;
                Ok(String::new())
            }
            Some(_) => self.element(),
            None => Err(TypesetError::MissingArgument(owner.to_string())),
        }
    }
}

/// Collapse space runs and trim each line.
fn tidy(raw: &str) -> String {
    let lines: Vec<String> = raw.split('\n').map(|line| line.split_whitespace().collect::<Vec<_>>().join(" ")).collect();
    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.is_empty()).map_or(start, |p| p + 1);
    lines[start..end].join("\n")
}

/// Parenthesise compound operands of `/` and `√`.
fn group(s: &str) -> String {
    let s = s.trim();
    let compound = s.chars().count() > 1 && s.chars().any(|c| !(c.is_alphanumeric() || c == '.' || c == '′'));
    if compound { format!("({})", s) } else { s.to_string() }
}

fn map_script(s: &str, map: fn(char) -> Option<char>) -> Option<String> {
    if s.is_empty() {
        return None;
    }
    s.chars().map(map).collect()
}

fn superscript(s: &str) -> String {
    let s = s.trim();
    match map_script(s, superscript_char) {
        Some(mapped) => mapped,
        None if s.chars().count() == 1 => format!("^{}", s),
        None => format!("^({})", s),
    }
}

fn subscript(s: &str) -> String {
    let s = s.trim();
    match map_script(s, subscript_char) {
        Some(mapped) => mapped,
        None if s.chars().count() == 1 => format!("_{}", s),
        None => format!("_({})", s),
    }
}

fn superscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '−' | '-' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'a' => 'ᵃ',
        'b' => 'ᵇ',
        'c' => 'ᶜ',
        'd' => 'ᵈ',
        'e' => 'ᵉ',
        'f' => 'ᶠ',
        'g' => 'ᵍ',
        'h' => 'ʰ',
        'i' => 'ⁱ',
        'j' => 'ʲ',
        'k' => 'ᵏ',
        'l' => 'ˡ',
        'm' => 'ᵐ',
        'n' => 'ⁿ',
        'o' => 'ᵒ',
        'p' => 'ᵖ',
        'r' => 'ʳ',
        's' => 'ˢ',
        't' => 'ᵗ',
        'u' => 'ᵘ',
        'v' => 'ᵛ',
        'w' => 'ʷ',
        'x' => 'ˣ',
        'y' => 'ʸ',
        'z' => 'ᶻ',
        'T' => 'ᵀ',
        '∘' | '°' => '°',
        '′' => '′',
        _ => return None,
    })
}

fn subscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '−' | '-' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        'a' => 'ₐ',
        'e' => 'ₑ',
        'h' => 'ₕ',
        'i' => 'ᵢ',
        'j' => 'ⱼ',
        'k' => 'ₖ',
        'l' => 'ₗ',
        'm' => 'ₘ',
        'n' => 'ₙ',
        'o' => 'ₒ',
        'p' => 'ₚ',
        'r' => 'ᵣ',
        's' => 'ₛ',
        't' => 'ₜ',
        'u' => 'ᵤ',
        'v' => 'ᵥ',
        'x' => 'ₓ',
        'β' => 'ᵦ',
        'γ' => 'ᵧ',
        'ρ' => 'ᵨ',
        'φ' => 'ᵩ',
        'χ' => 'ᵪ',
        _ => return None,
    })
}

/// Combining mark for an accent command, and whether it applies per char.
fn accent(name: &str) -> Option<(char, bool)> {
    Some(match name {
        "vec" | "overrightarrow" => ('\u{20D7}', false),
        "hat" | "widehat" => ('\u{0302}', false),
        "tilde" | "widetilde" => ('\u{0303}', false),
        "dot" => ('\u{0307}', false),
        "ddot" => ('\u{0308}', false),
        "bar" | "overline" => ('\u{0305}', true),
        "underline" => ('\u{0332}', true),
        _ => return None,
    })
}

fn apply_accent(base: &str, mark: char, per_char: bool) -> String {
    let base = base.trim();
    if per_char {
        base.chars().flat_map(|c| [c, mark]).collect()
    } else {
        format!("{}{}", base, mark)
    }
}

fn negate(s: &str) -> String {
    match s.trim() {
        "=" => "≠".to_string(),
        "∈" => "∉".to_string(),
        "<" => "≮".to_string(),
        ">" => "≯".to_string(),
        "≤" => "≰".to_string(),
        "≥" => "≱".to_string(),
        "⊂" => "⊄".to_string(),
        "≡" => "≢".to_string(),
        "∼" => "≁".to_string(),
        "≈" => "≉".to_string(),
        other => format!("{}\u{0338}", other),
    }
}

fn blackboard(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'R' => 'ℝ',
            'N' => 'ℕ',
            'Z' => 'ℤ',
            'Q' => 'ℚ',
            'C' => 'ℂ',
            'P' => 'ℙ',
            'H' => 'ℍ',
            other => other,
        })
        .collect()
}

fn environment_open(env: &str) -> &'static str {
    match env {
        "pmatrix" => "(",
        "bmatrix" => "[",
        "Bmatrix" => "{",
        "vmatrix" => "|",
        "Vmatrix" => "‖",
        "cases" => "{ ",
        _ => "",
    }
}

fn environment_close(env: &str) -> &'static str {
    match env {
        "pmatrix" => ")",
        "bmatrix" => "]",
        "Bmatrix" => "}",
        "vmatrix" => "|",
        "Vmatrix" => "‖",
        _ => "",
    }
}

const FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "cot", "sec", "csc", "arcsin", "arccos", "arctan", "sinh", "cosh", "tanh", "log", "ln", "lg",
    "exp", "lim", "liminf", "limsup", "max", "min", "sup", "inf", "det", "dim", "ker", "deg", "gcd", "arg", "Pr",
];

fn symbol(name: &str) -> Option<&'static str> {
    Some(match name {
        // Greek
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" | "varepsilon" => "ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" => "θ",
        "vartheta" => "ϑ",
        "iota" => "ι",
        "kappa" => "κ",
        "lambda" => "λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "omicron" => "ο",
        "pi" => "π",
        "varpi" => "ϖ",
        "rho" => "ρ",
        "varrho" => "ϱ",
        "sigma" => "σ",
        "varsigma" => "ς",
        "tau" => "τ",
        "upsilon" => "υ",
        "phi" | "varphi" => "φ",
        "chi" => "χ",
        "psi" => "ψ",
        "omega" => "ω",
        "Gamma" => "Γ",
        "Delta" => "Δ",
        "Theta" => "Θ",
        "Lambda" => "Λ",
        "Xi" => "Ξ",
        "Pi" => "Π",
        "Sigma" => "Σ",
        "Upsilon" => "Υ",
        "Phi" => "Φ",
        "Psi" => "Ψ",
        "Omega" => "Ω",

        // Binary operators
        "times" => "×",
        "cdot" | "cdotp" => "·",
        "div" => "÷",
        "pm" => "±",
        "mp" => "∓",
        "ast" => "∗",
        "star" => "⋆",
        "circ" => "∘",
        "bullet" => "•",
        "oplus" => "⊕",
        "otimes" => "⊗",
        "cup" => "∪",
        "cap" => "∩",
        "setminus" => "∖",
        "land" | "wedge" => "∧",
        "lor" | "vee" => "∨",
        "sqcup" => "⊔",
        "uplus" => "⊎",

        // Relations
        "leq" | "le" => "≤",
        "geq" | "ge" => "≥",
        "leqslant" => "⩽",
        "geqslant" => "⩾",
        "neq" | "ne" => "≠",
        "approx" => "≈",
        "approxeq" => "≊",
        "equiv" => "≡",
        "cong" => "≅",
        "sim" => "∼",
        "simeq" => "≃",
        "doteq" => "≐",
        "propto" => "∝",
        "ll" => "≪",
        "gg" => "≫",
        "prec" => "≺",
        "succ" => "≻",
        "in" => "∈",
        "notin" => "∉",
        "ni" => "∋",
        "subset" => "⊂",
        "supset" => "⊃",
        "subseteq" => "⊆",
        "supseteq" => "⊇",
        "perp" => "⊥",
        "parallel" => "∥",
        "mid" => "∣",
        "nmid" => "∤",
        "vdash" => "⊢",
        "models" => "⊨",

        // Arrows
        "to" | "rightarrow" => "→",
        "leftarrow" | "gets" => "←",
        "leftrightarrow" => "↔",
        "Rightarrow" => "⇒",
        "Leftarrow" => "⇐",
        "Leftrightarrow" => "⇔",
        "implies" => "⟹",
        "impliedby" => "⟸",
        "iff" => "⟺",
        "mapsto" => "↦",
        "longrightarrow" => "⟶",
        "longleftarrow" => "⟵",
        "uparrow" => "↑",
        "downarrow" => "↓",

        // Big operators and calculus
        "sum" => "∑",
        "prod" => "∏",
        "coprod" => "∐",
        "int" => "∫",
        "iint" => "∬",
        "iiint" => "∭",
        "oint" => "∮",
        "bigcup" => "⋃",
        "bigcap" => "⋂",
        "partial" => "∂",
        "nabla" => "∇",
        "infty" => "∞",

        // Logic and sets
        "forall" => "∀",
        "exists" => "∃",
        "nexists" => "∄",
        "neg" | "lnot" => "¬",
        "emptyset" | "varnothing" => "∅",
        "therefore" => "∴",
        "because" => "∵",
        "top" => "⊤",
        "bot" => "⊥",

        // Delimiters
        "langle" => "⟨",
        "rangle" => "⟩",
        "lfloor" => "⌊",
        "rfloor" => "⌋",
        "lceil" => "⌈",
        "rceil" => "⌉",
        "lvert" | "rvert" | "vert" => "|",
        "lVert" | "rVert" | "Vert" => "‖",
        "lbrace" => "{",
        "rbrace" => "}",

        // Dots and spacing
        "ldots" | "dots" | "dotsc" => "…",
        "cdots" | "dotsb" => "⋯",
        "vdots" => "⋮",
        "ddots" => "⋱",
        "quad" => "  ",
        "qquad" => "    ",
        "colon" => ":",

        // Letter-like
        "prime" => "′",
        "hbar" => "ℏ",
        "ell" => "ℓ",
        "Re" => "ℜ",
        "Im" => "ℑ",
        "aleph" => "ℵ",
        "wp" => "℘",
        "imath" => "ı",
        "jmath" => "ȷ",
        "angle" => "∠",
        "triangle" => "△",
        "degree" => "°",
        "square" | "Box" => "□",
        "checkmark" => "✓",
        "dagger" | "dag" => "†",
        "S" => "§",
        "P" => "¶",
        "pounds" => "£",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(latex: &str) -> String {
        typeset(latex).unwrap_or_else(|e| panic!("{:?} failed: {}", latex, e))
    }

    #[test]
    fn scripts() {
        assert_eq!(ok("x^2 + y_1"), "x² + y₁");
        assert_eq!(ok("x^{-1}"), "x⁻¹");
        assert_eq!(ok("a_{ij}"), "aᵢⱼ");
        assert_eq!(ok("e^{i\\pi}"), "e^(iπ)");
        assert_eq!(ok("90^\\circ"), "90°");
        assert_eq!(ok("f'(x)"), "f′(x)");
    }

    #[test]
    fn greek_and_operators() {
        assert_eq!(ok("\\alpha + \\beta \\leq \\Omega"), "α + β ≤ Ω");
        assert_eq!(ok("a \\times b \\neq c"), "a × b ≠ c");
        assert_eq!(ok("x - 1"), "x − 1");
        assert_eq!(ok("x \\to \\infty"), "x → ∞");
    }

    #[test]
    fn fractions_and_roots() {
        assert_eq!(ok("\\frac{1}{2}"), "1/2");
        assert_eq!(ok("\\frac{a+b}{2}"), "(a+b)/2");
        assert_eq!(ok("\\dfrac12"), "1/2");
        assert_eq!(ok("\\sqrt{x+1}"), "√(x+1)");
        assert_eq!(ok("\\sqrt{16}"), "√16");
        assert_eq!(ok("\\sqrt[3]{8}"), "∛8");
    }

    #[test]
    fn text_and_functions() {
        assert_eq!(ok("\\text{if } x > 0"), "if x > 0");
        assert_eq!(ok("\\sin x + \\cos\\theta"), "sin x + cos θ");
        assert_eq!(ok("\\log_2 n"), "log₂ n");
        assert_eq!(ok("\\mathbb{R}^n"), "ℝⁿ");
    }

    #[test]
    fn delimiters_and_accents() {
        assert_eq!(ok("\\left( \\frac{1}{2} \\right)"), "( 1/2 )");
        assert_eq!(ok("\\left. x \\right|"), "x |");
        assert_eq!(ok("\\vec{v}"), "v\u{20D7}");
        assert_eq!(ok("\\bar{xy}"), "x\u{0305}y\u{0305}");
        assert_eq!(ok("a \\not= b"), "a ≠ b");
    }

    #[test]
    fn matrices_and_line_breaks() {
        assert_eq!(ok("\\begin{pmatrix} a & b \\\\ c & d \\end{pmatrix}"), "( a b\nc d )");
        assert_eq!(ok("\\begin{aligned} x &= 1 \\\\ y &= 2 \\end{aligned}"), "x = 1\ny = 2");
    }

    #[test]
    fn failures() {
        assert_eq!(typeset("\\foo"), Err(TypesetError::UnknownCommand("foo".into())));
        assert_eq!(typeset("{x"), Err(TypesetError::UnbalancedBraces));
        assert_eq!(typeset("x}"), Err(TypesetError::UnbalancedBraces));
        assert_eq!(typeset("x^"), Err(TypesetError::MissingArgument("^".into())));
        assert_eq!(typeset("\\frac{1}"), Err(TypesetError::MissingArgument("frac".into())));
        assert_eq!(typeset("\\"), Err(TypesetError::MissingArgument("\\".into())));
    }

    #[test]
    fn runaway_nesting_is_an_error() {
        let braces = format!("{}x{}", "{".repeat(50_000), "}".repeat(50_000));
        assert_eq!(typeset(&braces), Err(TypesetError::UnbalancedBraces));

        let fracs = format!("{}1", "\\frac".repeat(50_000));
        assert_eq!(typeset(&fracs), Err(TypesetError::UnbalancedBraces));

        assert_eq!(ok(&format!("{}x{}", "{".repeat(20), "}".repeat(20))), "x");
    }
}
