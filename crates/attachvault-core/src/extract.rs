//! Attachment discovery in a message's part tree.

use tracing::warn;

use crate::model::{AttachmentPart, Part};

/// Maximum nesting depth that is walked.
pub const MAX_PART_DEPTH: usize = 64;

/// Collects every attachment candidate below `root`, depth-first.
///
/// Containers are descended into and never reported themselves, even
/// when they carry a filename. Leaves qualify when they have both a
/// non-empty filename and an attachment reference. Order follows a
/// pre-order walk, so the result is stable for a given tree.
///
/// Subtrees nested deeper than [`MAX_PART_DEPTH`] are skipped.
#[must_use]
pub fn find_attachments(root: &Part) -> Vec<AttachmentPart<'_>> {
    let mut found = Vec::new();
    let mut stack = vec![(root, 0usize)];

    while let Some((part, depth)) = stack.pop() {
        match part {
            Part::Internal { children, .. } => {
                if depth >= MAX_PART_DEPTH {
                    warn!("Part tree deeper than {MAX_PART_DEPTH} levels, skipping subtree");
                    continue;
                }
                // Reversed so the first child is popped first
                stack.extend(children.iter().rev().map(|child| (child, depth + 1)));
            }
            Part::Leaf { .. } => {
                if let Some(attachment) = part.as_attachment() {
                    found.push(attachment);
                }
            }
        }
    }

    found
}
