//! Block structure of a command list
//!
//! Pairs If/Else/EndIf and For/EndFor, and finds the loop enclosing each
//! Break and Continue. Structural problems are reported as diagnostics; an
//! unmatched command simply has no links and falls through at run time.

use crate::command::BlockRole;
use crate::script::ScriptCommand;

/// Links of one command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockLinks {
    /// If/Else -> EndIf, For -> EndFor, EndIf -> If, EndFor -> For
    pub partner: Option<usize>,
    /// If -> Else
    pub else_index: Option<usize>,
    /// Break/Continue -> For
    pub enclosing_loop: Option<usize>,
}

/// Load-time problem found in block structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDiagnostic {
    /// Index of the offending command
    pub index: usize,
    pub message: String,
    pub recommendation: String,
}

/// Block links for every command of a list
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    links: Vec<BlockLinks>,
}

struct OpenBlock<'a> {
    role: BlockRole,
    index: usize,
    line: usize,
    name: Option<&'a str>,
    else_index: Option<usize>,
}

impl BlockMap {
    /// Analyze a command list
    pub fn analyze(commands: &[ScriptCommand]) -> (BlockMap, Vec<BlockDiagnostic>) {
        let mut links = vec![BlockLinks::default(); commands.len()];
        let mut diagnostics = Vec::new();
        let mut open: Vec<OpenBlock<'_>> = Vec::new();

        let mut report = |index: usize, message: String, recommendation: &str| {
            diagnostics.push(BlockDiagnostic {
                index,
                message,
                recommendation: recommendation.to_string(),
            });
        };

        for (index, cmd) in commands.iter().enumerate() {
            let role = cmd.block_role();
            let name = block_name(cmd);
            let line = cmd.line_number();

            match role {
                BlockRole::None => {}
                BlockRole::If | BlockRole::For => open.push(OpenBlock {
                    role,
                    index,
                    line,
                    name,
                    else_index: None,
                }),
                BlockRole::Else => match open.last_mut() {
                    Some(top) if top.role == BlockRole::If && top.else_index.is_none() => {
                        top.else_index = Some(index);
                        links[top.index].else_index = Some(index);
                        if let Some(problem) = name_mismatch(top, name) {
                            report(index, problem, "Use the same Name as the matching If.");
                        }
                    }
                    Some(top) if top.role == BlockRole::If => report(
                        index,
                        format!(
                            "Else at line {} follows another Else for the If at line {}.",
                            line, top.line
                        ),
                        "Remove the extra Else.",
                    ),
                    _ => report(
                        index,
                        format!("Else at line {} has no matching If.", line),
                        "Add an If before the Else or remove the Else.",
                    ),
                },
                BlockRole::EndIf | BlockRole::EndFor => {
                    let (opener, closer) = if role == BlockRole::EndIf {
                        (BlockRole::If, "EndIf")
                    } else {
                        (BlockRole::For, "EndFor")
                    };
                    let opener_name = if opener == BlockRole::If { "If" } else { "For" };

                    match open.last() {
                        Some(top) if top.role == opener => {
                            if let Some(problem) = name_mismatch(top, name) {
                                report(
                                    index,
                                    problem,
                                    "Use the same Name on the opening and closing commands.",
                                );
                            }
                            if let Some(e) = top.else_index {
                                links[e].partner = Some(index);
                            }
                            links[top.index].partner = Some(index);
                            links[index].partner = Some(top.index);
                            open.pop();
                        }
                        Some(top) => report(
                            index,
                            format!(
                                "{} at line {} does not close the {} at line {}.",
                                closer,
                                line,
                                role_name(top.role),
                                top.line
                            ),
                            "Close blocks in the reverse order they are opened.",
                        ),
                        None => report(
                            index,
                            format!("{} at line {} has no matching {}.", closer, line, opener_name),
                            "Add the opening command or remove this one.",
                        ),
                    }
                }
                BlockRole::Break | BlockRole::Continue => {
                    match open.iter().rev().find(|b| b.role == BlockRole::For) {
                        Some(for_block) => links[index].enclosing_loop = Some(for_block.index),
                        None => report(
                            index,
                            format!(
                                "{} at line {} is not inside a For loop.",
                                role_name(role),
                                line
                            ),
                            "Remove the command or move it inside For/EndFor.",
                        ),
                    }
                }
            }
        }

        for block in open {
            let closer = if block.role == BlockRole::If { "EndIf" } else { "EndFor" };
            report(
                block.index,
                format!(
                    "{} at line {} has no matching {}.",
                    role_name(block.role),
                    block.line,
                    closer
                ),
                &format!("Add {} to close the block.", closer),
            );
        }

        diagnostics.sort_by_key(|d| d.index);
        (BlockMap { links }, diagnostics)
    }

    /// Get the links of a command
    pub fn links(&self, index: usize) -> BlockLinks {
        self.links.get(index).copied().unwrap_or_default()
    }

    /// Index of the command after the block that starts at `index`
    ///
    /// For If this is after the Else when there is one, otherwise after EndIf.
    pub fn skip_target(&self, index: usize) -> Option<usize> {
        let links = self.links(index);
        links
            .else_index
            .or(links.partner)
            .map(|target| target + 1)
    }

    /// Matching opener or closer
    pub fn partner(&self, index: usize) -> Option<usize> {
        self.links(index).partner
    }

    /// For loop enclosing a Break or Continue
    pub fn enclosing_loop(&self, index: usize) -> Option<usize> {
        self.links(index).enclosing_loop
    }
}

fn block_name(cmd: &ScriptCommand) -> Option<&str> {
    cmd.parameters()
        .get("Name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

fn name_mismatch(open: &OpenBlock<'_>, name: Option<&str>) -> Option<String> {
    match (open.name, name) {
        (Some(a), Some(b)) if a != b => Some(format!(
            "Name \"{}\" does not match Name \"{}\" of the {} at line {}.",
            b,
            a,
            role_name(open.role),
            open.line
        )),
        _ => None,
    }
}

fn role_name(role: BlockRole) -> &'static str {
    match role {
        BlockRole::None => "command",
        BlockRole::If => "If",
        BlockRole::Else => "Else",
        BlockRole::EndIf => "EndIf",
        BlockRole::For => "For",
        BlockRole::EndFor => "EndFor",
        BlockRole::Break => "Break",
        BlockRole::Continue => "Continue",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::CommandFactory;
    use pretty_assertions::assert_eq;

    fn analyze(lines: &[&str]) -> (BlockMap, Vec<BlockDiagnostic>) {
        let factory = CommandFactory::with_builtins();
        let commands: Vec<_> = lines
            .iter()
            .enumerate()
            .map(|(i, l)| factory.create(l, i + 1))
            .collect();
        BlockMap::analyze(&commands)
    }

    #[test]
    fn test_if_else_endif() {
        let (map, diags) = analyze(&[
            "If(Condition=\"1 < 2\")",
            "Message(Message=a)",
            "Else()",
            "Message(Message=b)",
            "EndIf()",
        ]);
        assert!(diags.is_empty());
        assert_eq!(map.skip_target(0), Some(3));
        assert_eq!(map.skip_target(2), Some(5));
        assert_eq!(map.partner(4), Some(0));
    }

    #[test]
    fn test_nested_loops_and_break() {
        let (map, diags) = analyze(&[
            "For(IteratorProperty=i,Sequence=1:2)",
            "For(IteratorProperty=j,Sequence=1:2)",
            "Break()",
            "EndFor()",
            "Continue()",
            "EndFor()",
        ]);
        assert!(diags.is_empty());
        assert_eq!(map.partner(0), Some(5));
        assert_eq!(map.partner(1), Some(3));
        assert_eq!(map.enclosing_loop(2), Some(1));
        assert_eq!(map.enclosing_loop(4), Some(0));
        assert_eq!(map.skip_target(1), Some(4));
    }

    #[test]
    fn test_unmatched() {
        let (map, diags) = analyze(&["If(Condition=true)", "EndFor()", "Break()"]);
        let indices: Vec<usize> = diags.iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(map.skip_target(0), None);
        assert!(diags[0].message.contains("no matching EndIf"));
        assert!(diags[2].message.contains("not inside a For loop"));
    }

    #[test]
    fn test_name_mismatch() {
        let (map, diags) = analyze(&["If(Name=a,Condition=true)", "EndIf(Name=b)"]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].index, 1);
        assert_eq!(map.partner(0), Some(1));
    }

    #[test]
    fn test_names_optional_on_one_side() {
        let (_, diags) = analyze(&["For(Name=loop,IteratorProperty=i,List=a)", "EndFor()"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_else_without_if() {
        let (_, diags) = analyze(&["Else()", "If(Condition=true)", "Else()", "Else()", "EndIf()"]);
        let indices: Vec<usize> = diags.iter().map(|d| d.index).collect();
        assert_eq!(indices, vec![0, 3]);
    }
}
