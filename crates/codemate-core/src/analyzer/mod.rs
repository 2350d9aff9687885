//! Fenced code extraction and shallow syntax validation.
//!
//! Everything here is pure: the same text always yields the same blocks and
//! the same findings.

mod extract;
mod syntax;

pub use extract::{extract_blocks, infer_language, render_blocks};
pub use syntax::{SyntaxReport, check_syntax};

use crate::types::CodeBlock;

/// Runs [`check_syntax`] over every block and flattens the findings.
///
/// Each detail is prefixed with the block language and its 1-based position
/// so callers can tell blocks apart.
pub fn analyze_blocks<'a>(blocks: impl IntoIterator<Item = &'a CodeBlock>) -> Vec<String> {
    blocks
        .into_iter()
        .enumerate()
        .flat_map(|(index, block)| {
            let report = check_syntax(&block.code, &block.language);
            report
                .details
                .into_iter()
                .map(move |detail| format!("{} block {}: {detail}", block.language, index + 1))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn findings_are_prefixed_by_block() {
        let blocks = vec![
            CodeBlock {
                language: "python".into(),
                code: "print('ok')".into(),
            },
            CodeBlock {
                language: "javascript".into(),
                code: "function f() {".into(),
            },
        ];
        let details = analyze_blocks(&blocks);
        assert_eq!(details.len(), 1);
        assert!(details[0].starts_with("javascript block 2:"), "{details:?}");
    }
}
