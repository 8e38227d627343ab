/// Content compilation — turns content trees into rendered blocks against
/// live state.
///
/// Dependencies are evaluated exactly once per pass, before any node is
/// substituted. Conditionals that evaluate false are elided wholly, not
/// blanked. The same mechanism compiles scene bodies and choice titles.
use crate::schema::callable::{run_expression, run_predicate, CallableFault, Value};
use crate::schema::content::{
    BlockKind, ContentNode, ContentSource, ContentTree, Dependency, RenderedBlock,
};
use crate::schema::state::GameState;

/// The resolved value of one dependency for a single compilation pass.
enum Resolved {
    Bool(bool),
    Span(String),
}

fn resolve_dependencies(
    tree: &ContentTree,
    state: &GameState,
    faults: &mut Vec<CallableFault>,
) -> Vec<Resolved> {
    tree.dependencies
        .iter()
        .enumerate()
        .map(|(index, dep)| match dep {
            Dependency::Predicate(p) => {
                let context = format!("content predicate #{}", index);
                Resolved::Bool(run_predicate(Some(p), false, state, &context, faults))
            }
            Dependency::Insert(e) => {
                let context = format!("content insert #{}", index);
                let value = run_expression(
                    Some(e),
                    Value::Text(String::new()),
                    state,
                    &context,
                    faults,
                );
                Resolved::Span(value.to_string())
            }
        })
        .collect()
}

/// Append the spans an inline node run produces. Conditional content keeps
/// its inner spans separate, matching what the display surface receives.
fn render_inline(nodes: &[ContentNode], resolved: &[Resolved], spans: &mut Vec<String>) {
    for node in nodes {
        match node {
            ContentNode::Text(text) => spans.push(text.clone()),
            ContentNode::Conditional { predicate, content } => {
                if matches!(resolved.get(*predicate), Some(Resolved::Bool(true))) {
                    render_inline(content, resolved, spans);
                }
            }
            ContentNode::Insert(index) => {
                if let Some(Resolved::Span(text)) = resolved.get(*index) {
                    spans.push(text.clone());
                }
            }
            // Nested blocks flatten into the surrounding run.
            ContentNode::Paragraph(inner) | ContentNode::Heading(inner) => {
                render_inline(inner, resolved, spans);
            }
        }
    }
}

/// Compile content into rendered blocks. Plain text becomes a single
/// paragraph; bare inline nodes at the top of a tree are gathered into
/// implicit paragraphs between explicit blocks.
pub fn compile(
    source: &ContentSource,
    state: &GameState,
    faults: &mut Vec<CallableFault>,
) -> Vec<RenderedBlock> {
    let tree = match source {
        ContentSource::Text(text) => {
            return vec![RenderedBlock {
                kind: BlockKind::Paragraph,
                spans: vec![text.clone()],
            }];
        }
        ContentSource::Tree(tree) => tree,
    };

    let resolved = resolve_dependencies(tree, state, faults);
    let mut blocks = Vec::new();
    let mut pending: Vec<String> = Vec::new();

    let flush = |pending: &mut Vec<String>, blocks: &mut Vec<RenderedBlock>| {
        if !pending.is_empty() {
            blocks.push(RenderedBlock {
                kind: BlockKind::Paragraph,
                spans: std::mem::take(pending),
            });
        }
    };

    for node in &tree.nodes {
        match node {
            ContentNode::Paragraph(inner) | ContentNode::Heading(inner) => {
                flush(&mut pending, &mut blocks);
                let kind = match node {
                    ContentNode::Heading(_) => BlockKind::Heading,
                    _ => BlockKind::Paragraph,
                };
                let mut spans = Vec::new();
                render_inline(inner, &resolved, &mut spans);
                blocks.push(RenderedBlock { kind, spans });
            }
            inline => render_inline(std::slice::from_ref(inline), &resolved, &mut pending),
        }
    }
    flush(&mut pending, &mut blocks);
    blocks
}

/// Compile a title to a flat string through the same mechanism.
pub fn compile_title(
    source: &ContentSource,
    state: &GameState,
    faults: &mut Vec<CallableFault>,
) -> String {
    match source {
        ContentSource::Text(text) => text.clone(),
        ContentSource::Tree(tree) => {
            let resolved = resolve_dependencies(tree, state, faults);
            let mut spans = Vec::new();
            render_inline(&tree.nodes, &resolved, &mut spans);
            spans.concat()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::callable::{expression, predicate, Expression, Predicate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn no_faults() -> Vec<CallableFault> {
        Vec::new()
    }

    #[test]
    fn plain_text_becomes_single_paragraph() {
        let state = GameState::new("root".to_string());
        let mut faults = no_faults();
        let blocks = compile(&"This is the root content.".into(), &state, &mut faults);
        assert_eq!(
            blocks,
            vec![RenderedBlock::paragraph("This is the root content.")]
        );
    }

    #[test]
    fn heading_blocks_pass_through() {
        let state = GameState::new("root".to_string());
        let tree = ContentTree {
            nodes: vec![ContentNode::Heading(vec![ContentNode::Text(
                "The title".to_string(),
            )])],
            dependencies: vec![],
        };
        let mut faults = no_faults();
        let blocks = compile(&ContentSource::Tree(tree), &state, &mut faults);
        assert_eq!(
            blocks,
            vec![RenderedBlock {
                kind: BlockKind::Heading,
                spans: vec!["The title".to_string()],
            }]
        );
    }

    #[test]
    fn false_conditionals_are_elided_wholly() {
        let state = GameState::new("root".to_string());
        let tree = ContentTree {
            nodes: vec![ContentNode::Paragraph(vec![
                ContentNode::Conditional {
                    predicate: 0,
                    content: vec![ContentNode::Text("This should be visible.".to_string())],
                },
                ContentNode::Conditional {
                    predicate: 1,
                    content: vec![ContentNode::Text("This should be removed.".to_string())],
                },
            ])],
            dependencies: vec![
                Dependency::Predicate(predicate(|_| true)),
                Dependency::Predicate(predicate(|_| false)),
            ],
        };
        let mut faults = no_faults();
        let blocks = compile(&ContentSource::Tree(tree), &state, &mut faults);
        assert_eq!(
            blocks,
            vec![RenderedBlock::paragraph("This should be visible.")]
        );
    }

    #[test]
    fn inserts_are_stringified() {
        let mut state = GameState::new("root".to_string());
        state.qualities.insert("foo".to_string(), 5.0);
        let tree = ContentTree {
            nodes: vec![ContentNode::Paragraph(vec![
                ContentNode::Insert(0),
                ContentNode::Text(",".to_string()),
                ContentNode::Insert(1),
            ])],
            dependencies: vec![
                Dependency::Insert(expression(|state| {
                    Value::Number(state.quality_or("foo", 0.0))
                })),
                Dependency::Insert(expression(|state| {
                    Value::Number(state.quality_or("bar", 0.0))
                })),
            ],
        };
        let mut faults = no_faults();
        let blocks = compile(&ContentSource::Tree(tree), &state, &mut faults);
        assert_eq!(
            blocks,
            vec![RenderedBlock {
                kind: BlockKind::Paragraph,
                spans: vec!["5".to_string(), ",".to_string(), "0".to_string()],
            }]
        );
    }

    #[test]
    fn dependencies_evaluate_once_per_pass() {
        let state = GameState::new("root".to_string());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let p: Predicate = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        });
        // Two conditionals referencing the same dependency index.
        let tree = ContentTree {
            nodes: vec![ContentNode::Paragraph(vec![
                ContentNode::Conditional {
                    predicate: 0,
                    content: vec![ContentNode::Text("a".to_string())],
                },
                ContentNode::Conditional {
                    predicate: 0,
                    content: vec![ContentNode::Text("b".to_string())],
                },
            ])],
            dependencies: vec![Dependency::Predicate(p)],
        };
        let mut faults = no_faults();
        compile(&ContentSource::Tree(tree), &state, &mut faults);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_insert_falls_back_to_empty() {
        let state = GameState::new("root".to_string());
        let e: Expression = Arc::new(|_| {
            Err(crate::schema::callable::CallableError::new("broken insert"))
        });
        let tree = ContentTree {
            nodes: vec![ContentNode::Paragraph(vec![
                ContentNode::Text("value: ".to_string()),
                ContentNode::Insert(0),
            ])],
            dependencies: vec![Dependency::Insert(e)],
        };
        let mut faults = no_faults();
        let blocks = compile(&ContentSource::Tree(tree), &state, &mut faults);
        assert_eq!(
            blocks[0].spans,
            vec!["value: ".to_string(), "".to_string()]
        );
        assert_eq!(faults.len(), 1);
    }

    #[test]
    fn title_with_conditional_spans() {
        let state = GameState::new("root".to_string());
        let tree = ContentTree {
            nodes: vec![
                ContentNode::Text("The Foo (".to_string()),
                ContentNode::Conditional {
                    predicate: 0,
                    content: vec![ContentNode::Text("Checked".to_string())],
                },
                ContentNode::Text(")".to_string()),
            ],
            dependencies: vec![Dependency::Predicate(predicate(|_| true))],
        };
        let mut faults = no_faults();
        let title = compile_title(&ContentSource::Tree(tree), &state, &mut faults);
        assert_eq!(title, "The Foo (Checked)");
    }

    #[test]
    fn bare_inline_nodes_form_implicit_paragraph() {
        let state = GameState::new("root".to_string());
        let tree = ContentTree {
            nodes: vec![
                ContentNode::Text("one".to_string()),
                ContentNode::Text("two".to_string()),
                ContentNode::Heading(vec![ContentNode::Text("head".to_string())]),
            ],
            dependencies: vec![],
        };
        let mut faults = no_faults();
        let blocks = compile(&ContentSource::Tree(tree), &state, &mut faults);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(blocks[0].spans, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(blocks[1].kind, BlockKind::Heading);
    }
}
