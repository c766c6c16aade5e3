use lox::KEYWORDS;

/// Input accumulated by the REPL until its braces balance.
pub struct ReplState {
    buffer: String,
    brace_depth: usize,
}

impl ReplState {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            brace_depth: 0,
        }
    }

    pub fn prompt(&self) -> String {
        if self.brace_depth == 0 {
            "> ".to_string()
        } else {
            format!("..{} ", self.brace_depth)
        }
    }

    /// Returns true once the buffer is ready to run.
    pub fn process_line(&mut self, line: &str) -> bool {
        for ch in strip_comment(line).chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => self.brace_depth = self.brace_depth.saturating_sub(1),
                _ => {}
            }
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');

        self.brace_depth == 0
    }

    pub fn take_buffer(&mut self) -> String {
        self.brace_depth = 0;
        std::mem::take(&mut self.buffer)
    }

    pub fn cancel(&mut self) {
        self.buffer.clear();
        self.brace_depth = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// A bare expression typed without a semicolon gets its value printed.
    pub fn should_auto_print(input: &str) -> bool {
        let code = strip_comment(input.trim()).trim();
        if code.is_empty() || code.contains('\n') {
            return false;
        }
        if code.ends_with('}') || code.ends_with(';') {
            return false;
        }
        if code.starts_with("print(") {
            return false;
        }

        // Incomplete statements are left for the parser to report.
        for keyword in KEYWORDS.keys() {
            if matches!(*keyword, "nil" | "true" | "false") {
                continue;
            }
            if let Some(rest) = code.strip_prefix(keyword) {
                if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('(') {
                    return false;
                }
            }
        }

        true
    }

    pub fn wrap_for_print(input: &str) -> String {
        format!("print({});", strip_comment(input.trim()).trim())
    }
}

/// Drops a trailing `//` comment that is not inside a string literal.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => in_string = !in_string,
            '/' if !in_string => {
                if let Some((_, '/')) = chars.peek() {
                    return &line[..i];
                }
            }
            _ => {}
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_empty_state() {
        let state = ReplState::new();
        assert!(state.is_empty());
        assert_eq!(state.brace_depth, 0);
    }

    #[test]
    fn prompt_shows_depth_when_in_block() {
        let mut state = ReplState::new();
        assert_eq!(state.prompt(), "> ");
        state.process_line("{");
        assert_eq!(state.prompt(), "..1 ");
        state.process_line("fun f() {");
        assert_eq!(state.prompt(), "..2 ");
    }

    #[test]
    fn process_line_ready_when_braces_balanced() {
        let mut state = ReplState::new();
        assert!(state.process_line("print(1);"));
    }

    #[test]
    fn process_line_waits_for_block_to_close() {
        let mut state = ReplState::new();
        assert!(!state.process_line("class Point {"));
        assert!(!state.process_line("  sum() { return 1; }"));
        assert!(state.process_line("}"));
    }

    #[test]
    fn braces_in_comments_are_ignored() {
        let mut state = ReplState::new();
        assert!(state.process_line("print(1); // {"));
    }

    #[test]
    fn take_buffer_returns_lines_and_clears() {
        let mut state = ReplState::new();
        state.process_line("{");
        state.process_line("print(1);");
        state.process_line("}");

        assert_eq!(state.take_buffer(), "{\nprint(1);\n}\n");
        assert!(state.is_empty());
    }

    #[test]
    fn cancel_clears_buffer_and_depth() {
        let mut state = ReplState::new();
        state.process_line("{");
        state.process_line("print(1);");
        state.cancel();

        assert!(state.is_empty());
        assert_eq!(state.prompt(), "> ");
    }

    #[test]
    fn unmatched_closing_brace_does_not_underflow() {
        let mut state = ReplState::new();
        assert!(state.process_line("}"));
        assert_eq!(state.brace_depth, 0);
    }

    #[test]
    fn bare_expressions_are_auto_printed() {
        assert!(ReplState::should_auto_print("1 + 2"));
        assert!(ReplState::should_auto_print("\"lox\""));
        assert!(ReplState::should_auto_print("x"));
        assert!(ReplState::should_auto_print("nil"));
        assert!(ReplState::should_auto_print("true == false"));
        assert!(ReplState::should_auto_print("makeCounter()()"));
        assert!(ReplState::should_auto_print("1 + 2 // sum"));
    }

    #[test]
    fn statements_are_not_auto_printed() {
        assert!(!ReplState::should_auto_print("print(1);"));
        assert!(!ReplState::should_auto_print("print(1)"));
        assert!(!ReplState::should_auto_print("var x = 1;"));
        assert!(!ReplState::should_auto_print("{ print(1); }"));
        assert!(!ReplState::should_auto_print("fun f() {}"));
    }

    #[test]
    fn comments_and_blank_input_are_not_auto_printed() {
        assert!(!ReplState::should_auto_print(""));
        assert!(!ReplState::should_auto_print("  \n"));
        assert!(!ReplState::should_auto_print("// note"));
        assert!(!ReplState::should_auto_print("print(1); // done"));
    }

    #[test]
    fn incomplete_keyword_statements_are_left_to_the_parser() {
        assert!(!ReplState::should_auto_print("var x = 1"));
        assert!(!ReplState::should_auto_print("return x"));
        assert!(!ReplState::should_auto_print("while (x)"));
        assert!(!ReplState::should_auto_print("class Point"));
        assert!(!ReplState::should_auto_print("if (true) 1"));
    }

    #[test]
    fn identifiers_with_keyword_prefix_are_expressions() {
        assert!(ReplState::should_auto_print("variable"));
        assert!(ReplState::should_auto_print("format"));
    }

    #[test]
    fn wrap_for_print_calls_print() {
        assert_eq!(ReplState::wrap_for_print("a"), "print(a);");
        assert_eq!(ReplState::wrap_for_print(" 1 + 2 // sum\n"), "print(1 + 2);");
    }

    #[test]
    fn strip_comment_keeps_slashes_inside_strings() {
        assert_eq!(strip_comment("\"a//b\" // c"), "\"a//b\" ");
        assert_eq!(strip_comment("4 / 2"), "4 / 2");
    }
}
