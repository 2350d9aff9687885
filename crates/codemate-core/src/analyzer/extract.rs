use std::sync::LazyLock;

use regex::Regex;

use crate::types::CodeBlock;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+#.\-]*)[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
});

/// Extracts fenced code blocks in the order they appear.
///
/// The fence tag is lowercased; untagged fences get a language from
/// [`infer_language`]. Blocks whose body is blank are skipped.
pub fn extract_blocks(text: &str) -> Vec<CodeBlock> {
    FENCE
        .captures_iter(text)
        .filter_map(|caps| {
            let code = caps.get(2).map_or("", |m| m.as_str()).trim();
            if code.is_empty() {
                return None;
            }
            let tag = caps.get(1).map_or("", |m| m.as_str());
            let language = if tag.is_empty() {
                infer_language(code).to_owned()
            } else {
                tag.to_ascii_lowercase()
            };
            Some(CodeBlock {
                language,
                code: code.to_owned(),
            })
        })
        .collect()
}

/// Renders blocks back into fenced text, one fence per block.
pub fn render_blocks(blocks: &[CodeBlock]) -> String {
    blocks
        .iter()
        .map(|b| format!("```{}\n{}\n```", b.language, b.code))
        .collect::<Vec<_>>()
        .join("\n\n")
}

struct Signature {
    language: &'static str,
    markers: &'static [&'static str],
}

// Order breaks ties.
const SIGNATURES: &[Signature] = &[
    Signature {
        language: "python",
        markers: &[
            "def ", "import ", "from ", "print(", "elif ", "self.", "__name__", "None", "True:",
        ],
    },
    Signature {
        language: "javascript",
        markers: &[
            "function ", "const ", "let ", "=>", "console.log", "require(", "export ", "===",
        ],
    },
    Signature {
        language: "rust",
        markers: &["fn ", "let mut ", "impl ", "pub fn", "use std::", "println!", "::new("],
    },
    Signature {
        language: "bash",
        markers: &["#!/bin/", "$ ", "sudo ", "apt-get ", "pip install", "npm install", "cargo "],
    },
    Signature {
        language: "sql",
        markers: &["SELECT ", "INSERT INTO", "CREATE TABLE", "UPDATE ", "DELETE FROM"],
    },
];

/// Guesses a language from content when the fence carries no tag.
pub fn infer_language(code: &str) -> &'static str {
    let mut best = ("plaintext", 0usize);
    for signature in SIGNATURES {
        let score = signature
            .markers
            .iter()
            .filter(|marker| code.contains(*marker))
            .count();
        if score > best.1 {
            best = (signature.language, score);
        }
    }
    best.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extracts_tagged_and_untagged_blocks_in_order() {
        let text = "Here:\n```Python\nprint('hi')\n```\nand\n```\nconst x = () => 1;\nconsole.log(x);\n```\n";
        let blocks = extract_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language, "python");
        assert_eq!(blocks[0].code, "print('hi')");
        assert_eq!(blocks[1].language, "javascript");
    }

    #[test]
    fn untagged_unknown_content_is_plaintext() {
        let blocks = extract_blocks("```\nhello world\n```");
        assert_eq!(blocks[0].language, "plaintext");
    }

    #[test]
    fn blank_blocks_are_skipped() {
        assert!(extract_blocks("```rust\n   \n```").is_empty());
        assert!(extract_blocks("no fences at all").is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "intro\n```py\ndef f():\n    return 1\n```\ntext\n```\nSELECT * FROM t;\n```\n```c++\nint main() {}\n```";
        let first = extract_blocks(text);
        assert_eq!(first.len(), 3);
        let second = extract_blocks(&render_blocks(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn infers_rust() {
        assert_eq!(infer_language("fn main() {\n    println!(\"x\");\n}"), "rust");
    }
}
