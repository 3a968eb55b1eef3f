use crate::cli::args::{Cli, CompletionCommands};
use crate::utils::errors::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

pub fn handle_completion_command(command: &CompletionCommands) -> Result<()> {
    let shell = command.shell();
    let mut cmd = Cli::command();
    let app_name = "certmint";

    // For bash, add our custom completion enhancement first
    if matches!(shell, Shell::Bash) {
        println!("# Enhanced completion for certmint list columns");
        print!(
            r#"
_certmint_complete_columns() {{
    local columns
    columns=$(certmint completion-helper columns 2>/dev/null)

    # Handle comma-separated values and + prefix
    local current_word="${{cur}}"
    local prefix=""

    if [[ "$current_word" == +* ]]; then
        prefix="+"
        current_word="${{current_word:1}}"
    fi

    if [[ "$current_word" == *,* ]]; then
        prefix="$prefix${{current_word%,*}},"
        current_word="${{current_word##*,}}"
    fi

    COMPREPLY=($(compgen -W "$columns" -- "$current_word"))
    if [[ -n "$prefix" ]]; then
        COMPREPLY=("${{COMPREPLY[@]/#/$prefix}}")
    fi
}}

"#
        );
    }

    generate(shell, &mut cmd, app_name, &mut io::stdout());

    // Hook the column completer into the generated script
    if matches!(shell, Shell::Bash) {
        println!();
        println!("# Attach column completion to --columns");
        println!(
            r#"_certmint_original() {{ _certmint "$@"; }}
_certmint_enhanced() {{
    local cur prev
    cur="${{COMP_WORDS[COMP_CWORD]}}"
    prev="${{COMP_WORDS[COMP_CWORD-1]}}"
    if [[ "$prev" == "--columns" ]]; then
        _certmint_complete_columns
        return
    fi
    _certmint_original "$@"
}}
complete -F _certmint_enhanced certmint"#
        );
    }

    Ok(())
}
