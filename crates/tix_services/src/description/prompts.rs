use super::DiffContext;

/// System instructions sent with every description request.
pub const SYSTEM_INSTRUCTIONS: &str =
    "You are an expert at reviewing code changes and providing concise, informative descriptions.";

fn diff_section(diff: &DiffContext) -> String {
    match diff {
        DiffContext::Full(diff) => {
            format!("The full diff of the changes:\n\n```diff\n{}\n```", diff.trim_end())
        }
        DiffContext::Excerpts(block) => format!(
            "The diff is too large to include in full. The most relevant excerpts follow, \
each labelled with its file and relevance score:\n\n{}",
            block.trim_end()
        ),
    }
}

pub fn merge_request(diff: &DiffContext) -> String {
    format!(
        r#"Generate a concise and informative merge request description based on the following changes.

{diff}

Do not include any inline citations, references, or source markers in the output.

Please format the description EXACTLY in the following structure:

### Summary

A clear and concise summary of the changes (1-3 sentences). Focus on what was done and why.

### For Developers

Technical details about implementation, architecture changes, and code modifications. Include:
- Major code changes and their purpose
- New components or modules added
- Any performance considerations
- Breaking changes or deprecations

### For Quality

Information relevant for testers and QA:
- What should be tested
- Potential edge cases to consider
- Any specific testing procedures required
- Areas that might be impacted by these changes
"#,
        diff = diff_section(diff)
    )
}

pub fn issue(diff: &DiffContext, current_title: &str) -> String {
    format!(
        r#"Given the following code changes, write an issue description that outlines what needs to change and why, as if it were written before the code was implemented. The description should explain the motivation for the change, the intended behavior or outcome, and any constraints or considerations, but should avoid describing the actual implementation or code specifics. Assume the reader is a teammate reviewing this before any work has been started.

{diff}

The current issue title is: "{title}"

You can either keep this title or suggest a better one. If you suggest a new title, make sure it is clear, concise, and accurately reflects the changes being made.

Keep in mind that the current title was the original intention of the change and the new title and description should reflect that. If the original intention was a business logic change that required a large refactoring, keep the original intention as the focus of the generated text. The issue is about the intended behavior or outcome, not the implementation.

Please format the description EXACTLY in the following structure:

## <Put the title here. Keep the current title "{title}" or suggest a better one. It shouldn't be over 200 characters.>

### Summary

A clear and concise summary of the changes (1-3 sentences). Focus on what needs to change and why.

### Rationale

The rationale for the change. Again, it should be 1-3 sentences, clear and concise.

### Acceptance Criteria

- [ ] High-level acceptance criteria or goals
- [ ] They shouldn't mention specific file names, functions, or code
- [ ] They should be in markdown checkboxes
- [ ] They should assume the reader is a teammate reviewing this before any work has been started.
"#,
        diff = diff_section(diff),
        title = current_title
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_merge_request_prompt_embeds_full_diff() {
        let fixture = DiffContext::Full("+fn added() {}\n".to_string());

        let actual = merge_request(&fixture);

        assert!(actual.contains("```diff\n+fn added() {}\n```"));
        for section in ["### Summary", "### For Developers", "### For Quality"] {
            assert!(actual.contains(section), "missing {section}");
        }
    }

    #[test]
    fn test_issue_prompt_mentions_title_twice() {
        let fixture = DiffContext::Excerpts("--- Chunk 1 (file: a.rs, similarity: 0.900) ---\n+x\n".to_string());

        let actual = issue(&fixture, "Speed up login");

        assert_eq!(actual.matches("\"Speed up login\"").count(), 2);
        assert!(actual.contains("most relevant excerpts"));
        assert!(actual.contains("### Acceptance Criteria"));
    }
}
