use std::collections::BTreeSet;

/// Outcome of a shallow syntax check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxReport {
    /// `false` when the language has no checker; such code is never an error.
    pub checked: bool,
    pub ok: bool,
    pub details: Vec<String>,
}

impl SyntaxReport {
    fn unchecked() -> Self {
        Self {
            checked: false,
            ok: true,
            details: Vec::new(),
        }
    }

    fn from_details(details: Vec<String>) -> Self {
        Self {
            checked: true,
            ok: details.is_empty(),
            details,
        }
    }
}

enum Checker {
    Python,
    JavaScript,
}

fn checker_for(language: &str) -> Option<Checker> {
    match language.to_ascii_lowercase().as_str() {
        "python" | "py" | "python3" => Some(Checker::Python),
        "javascript" | "js" | "jsx" | "typescript" | "ts" | "tsx" => Some(Checker::JavaScript),
        _ => None,
    }
}

/// Bracket and indentation balance checks for Python and JavaScript.
pub fn check_syntax(code: &str, language: &str) -> SyntaxReport {
    match checker_for(language) {
        Some(Checker::Python) => SyntaxReport::from_details(check_python(code)),
        Some(Checker::JavaScript) => SyntaxReport::from_details(check_javascript(code)),
        None => SyntaxReport::unchecked(),
    }
}

// ── brackets ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Brackets {
    open: Vec<(char, usize)>,
}

impl Brackets {
    fn feed(&mut self, ch: char, line: usize, details: &mut Vec<String>) {
        match ch {
            '(' | '[' | '{' => self.open.push((ch, line)),
            ')' | ']' | '}' => match self.open.pop() {
                None => details.push(format!("line {line}: unmatched closing bracket '{ch}'")),
                Some((opening, opened_at)) if partner(opening) != ch => details.push(format!(
                    "line {line}: closing bracket '{ch}' does not match '{opening}' opened on line {opened_at}"
                )),
                Some(_) => {}
            },
            _ => {}
        }
    }

    fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    fn finish(self, details: &mut Vec<String>) {
        for (ch, line) in self.open {
            details.push(format!("line {line}: unclosed bracket '{ch}'"));
        }
    }
}

fn partner(opening: char) -> char {
    match opening {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

// ── python ───────────────────────────────────────────────────────────────────

const COMMON_MODULES: &[&str] = &["os", "sys", "json", "re", "math", "random", "datetime"];

struct OpenString {
    quote: char,
    triple: bool,
    line: usize,
}

fn check_python(code: &str) -> Vec<String> {
    let mut details = Vec::new();
    let mut brackets = Brackets::default();
    let mut string: Option<OpenString> = None;
    let mut indents: Vec<usize> = vec![0];
    // Line number of the last logical line that ended with ':'.
    let mut block_opener: Option<usize> = None;
    let mut continued = false;

    for (index, raw) in code.lines().enumerate() {
        let line_no = index + 1;
        let logical_start = brackets.is_empty() && string.is_none() && !continued;
        let trimmed = raw.trim_start();

        if logical_start && !trimmed.is_empty() && !trimmed.starts_with('#') {
            let leading = &raw[..raw.len() - trimmed.len()];
            if leading.contains(' ') && leading.contains('\t') {
                details.push(format!(
                    "line {line_no}: inconsistent use of tabs and spaces in indentation"
                ));
            }
            let width = indent_width(leading);
            let top = indents.last().copied().unwrap_or(0);
            if let Some(opener) = block_opener.take() {
                if width > top {
                    indents.push(width);
                } else {
                    details.push(format!(
                        "line {line_no}: expected an indented block after line {opener}"
                    ));
                    dedent(&mut indents, width, line_no, &mut details);
                }
            } else if width > top {
                details.push(format!("line {line_no}: unexpected indent"));
                indents.push(width);
            } else if width < top {
                dedent(&mut indents, width, line_no, &mut details);
            }
        }

        let mut last_significant = None;
        let mut chars = raw.chars().peekable();
        while let Some(ch) = chars.next() {
            if let Some(open) = &string {
                if ch == '\\' {
                    chars.next();
                    continue;
                }
                if ch == open.quote {
                    if !open.triple {
                        string = None;
                    } else if chars.peek() == Some(&open.quote) {
                        chars.next();
                        if chars.peek() == Some(&open.quote) {
                            chars.next();
                            string = None;
                        }
                    }
                }
                if string.is_none() {
                    last_significant = Some(ch);
                }
                continue;
            }
            match ch {
                '#' => break,
                '\'' | '"' => {
                    let triple = {
                        let mut ahead = chars.clone();
                        ahead.next() == Some(ch) && ahead.next() == Some(ch)
                    };
                    if triple {
                        chars.next();
                        chars.next();
                    }
                    string = Some(OpenString {
                        quote: ch,
                        triple,
                        line: line_no,
                    });
                }
                c if c.is_whitespace() => continue,
                c => brackets.feed(c, line_no, &mut details),
            }
            last_significant = Some(ch);
        }

        if let Some(open) = &string {
            if !open.triple {
                details.push(format!("line {line_no}: unterminated string literal"));
                string = None;
            }
        }

        continued = last_significant == Some('\\') && string.is_none();
        if brackets.is_empty() && string.is_none() && !continued && last_significant == Some(':') {
            block_opener = Some(line_no);
        }
    }

    if let Some(opener) = block_opener {
        details.push(format!(
            "line {opener}: expected an indented block before end of input"
        ));
    }
    if let Some(open) = string {
        details.push(format!(
            "line {}: unterminated triple-quoted string",
            open.line
        ));
    }
    brackets.finish(&mut details);
    details.extend(missing_imports(code));
    details
}

fn indent_width(leading: &str) -> usize {
    leading.chars().fold(0, |width, ch| match ch {
        '\t' => (width / 8 + 1) * 8,
        _ => width + 1,
    })
}

fn dedent(indents: &mut Vec<usize>, width: usize, line_no: usize, details: &mut Vec<String>) {
    while indents.len() > 1 && indents.last().is_some_and(|&top| top > width) {
        indents.pop();
    }
    if indents.last().is_some_and(|&top| top != width) {
        details.push(format!(
            "line {line_no}: unindent does not match any outer indentation level"
        ));
        indents.push(width);
    }
}

fn missing_imports(code: &str) -> Vec<String> {
    let mut imported = BTreeSet::new();
    for line in code.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("import ") {
            for name in rest.split(',') {
                if let Some(root) = name.split_whitespace().next() {
                    imported.insert(root.split('.').next().unwrap_or(root).to_owned());
                }
            }
        } else if let Some(rest) = line.strip_prefix("from ") {
            if let Some(module) = rest.split_whitespace().next() {
                imported.insert(module.split('.').next().unwrap_or(module).to_owned());
            }
            if let Some((_, names)) = rest.split_once(" import ") {
                for name in names.split(',') {
                    if let Some(bound) = name.split_whitespace().last() {
                        imported.insert(bound.trim_matches(|c| c == '(' || c == ')').to_owned());
                    }
                }
            }
        }
    }

    let mut details = Vec::new();
    for module in COMMON_MODULES {
        if imported.contains(*module) {
            continue;
        }
        let needle = format!("{module}.");
        let used_on = code.lines().enumerate().find_map(|(index, line)| {
            let code_part = line.split('#').next().unwrap_or(line);
            code_part
                .match_indices(&needle)
                .any(|(at, _)| {
                    at == 0
                        || !code_part[..at]
                            .chars()
                            .next_back()
                            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
                })
                .then_some(index + 1)
        });
        if let Some(line_no) = used_on {
            details.push(format!(
                "line {line_no}: module '{module}' is used but never imported"
            ));
        }
    }
    details
}

// ── javascript ───────────────────────────────────────────────────────────────

fn check_javascript(code: &str) -> Vec<String> {
    let mut details = Vec::new();
    let mut brackets = Brackets::default();
    let mut string: Option<(char, usize)> = None;
    let mut block_comment = false;

    for (index, line) in code.lines().enumerate() {
        let line_no = index + 1;
        let mut chars = line.chars().peekable();
        while let Some(ch) = chars.next() {
            if block_comment {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    block_comment = false;
                }
                continue;
            }
            if let Some((quote, _)) = string {
                if ch == '\\' {
                    chars.next();
                } else if ch == quote {
                    string = None;
                }
                continue;
            }
            match ch {
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    block_comment = true;
                }
                '\'' | '"' | '`' => string = Some((ch, line_no)),
                c => brackets.feed(c, line_no, &mut details),
            }
        }
        if let Some((quote, opened_at)) = string {
            if quote != '`' {
                details.push(format!("line {opened_at}: unterminated string literal"));
                string = None;
            }
        }
    }

    if let Some((_, opened_at)) = string {
        details.push(format!("line {opened_at}: unterminated template literal"));
    }
    brackets.finish(&mut details);
    details
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_python_passes() {
        let code = "import os\n\ndef main():\n    path = os.getcwd()\n    if path:\n        print(path)  # (\n    return {'a': [1, 2]}\n\nmain()\n";
        let report = check_syntax(code, "python");
        assert!(report.checked);
        assert!(report.ok, "{:?}", report.details);
    }

    #[test]
    fn unexpected_indent_is_reported() {
        let code = "def f():\n    x = 1\n        y = 2\n    return x\n";
        let report = check_syntax(code, "python");
        assert!(!report.ok);
        assert!(
            report.details.iter().any(|d| d.contains("line 3") && d.contains("unexpected indent")),
            "{:?}",
            report.details
        );
    }

    #[test]
    fn missing_block_after_colon_is_reported() {
        let report = check_syntax("def f():\nreturn 1\n", "py");
        assert!(
            report.details.iter().any(|d| d.contains("expected an indented block after line 1")),
            "{:?}",
            report.details
        );
    }

    #[test]
    fn trailing_block_opener_is_reported_once() {
        let report = check_syntax("x = 1\nif x:\n", "python");
        assert_eq!(
            report.details,
            vec!["line 2: expected an indented block before end of input".to_owned()]
        );
    }

    #[test]
    fn dangling_unindent_is_reported() {
        let code = "if True:\n        a = 1\n    b = 2\n";
        let report = check_syntax(code, "python");
        assert!(
            report.details.iter().any(|d| d.contains("unindent does not match")),
            "{:?}",
            report.details
        );
    }

    #[test]
    fn python_brackets_ignore_strings_and_comments() {
        let ok = check_syntax("s = '(' + \"]\"  # {\nt = \"\"\"\n)\n\"\"\"\n", "python");
        assert!(ok.ok, "{:?}", ok.details);
        let bad = check_syntax("x = [1, 2\ny = 3\n", "python");
        assert!(bad.details.iter().any(|d| d.contains("unclosed bracket '['")));
    }

    #[test]
    fn continuation_lines_are_not_indentation_errors() {
        let code = "total = (1 +\n         2)\nvalue = 1 + \\\n    2\n";
        let report = check_syntax(code, "python");
        assert!(report.ok, "{:?}", report.details);
    }

    #[test]
    fn missing_common_import_is_reported() {
        let report = check_syntax("print(json.dumps({}))\n", "python");
        assert!(report.details.iter().any(|d| d.contains("'json'")));
        let imported = check_syntax("from json import dumps\nimport os.path\nprint(os.sep)\n", "python");
        assert!(imported.ok, "{:?}", imported.details);
    }

    #[test]
    fn javascript_bracket_errors() {
        let report = check_syntax("function f() {\n  return [1, 2);\n}\n", "js");
        assert!(
            report.details.iter().any(|d| d.contains("does not match '['")),
            "{:?}",
            report.details
        );
        let extra = check_syntax("const a = 1);", "javascript");
        assert!(extra.details.iter().any(|d| d.contains("unmatched closing bracket ')'")));
    }

    #[test]
    fn javascript_strings_and_comments_are_skipped() {
        let code = "// {\n/* ( */ const s = \"}\" + '(' + `[${x}`;\nconst f = () => { return s; };\n";
        let report = check_syntax(code, "typescript");
        assert!(report.ok, "{:?}", report.details);
    }

    #[test]
    fn other_languages_are_unchecked() {
        let report = check_syntax("fn main() {", "rust");
        assert!(!report.checked);
        assert!(report.ok);
        assert!(report.details.is_empty());
    }
}
