//! Command Parser
//!
//! Tokenizes input lines and splits command flags from command arguments.

use super::executor::{CommandOptions, FormatType};
use crate::error::{CliError, Result};

/// Parse a command line into parts, respecting quotes.
///
/// A quote only opens a group at the start of a token; elsewhere it is
/// literal. A closed group always ends the token, so `""` yields an empty
/// argument.
pub fn parse_command(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '"';
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }

        match c {
            '\\' => escape_next = true,
            c if in_quotes && c == quote_char => {
                in_quotes = false;
                parts.push(std::mem::take(&mut current));
            }
            '"' | '\'' if !in_quotes && current.is_empty() => {
                in_quotes = true;
                quote_char = c;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Check if a command is handled by the REPL itself (not sent to server)
pub fn is_cli_command(cmd: &str) -> bool {
    matches!(
        cmd.to_lowercase().as_str(),
        "quit" | "exit" | "help" | "clear" | "?"
    )
}

/// Split `-f/--format`, `-r/--repeat`, `-d/--delay` and `--no-color` out of
/// the tokens. Flags may appear anywhere; everything else is kept, in order,
/// as command arguments. `--` ends flag parsing. Flags override `defaults`.
pub fn split_command_options(
    tokens: Vec<String>,
    defaults: CommandOptions,
) -> Result<(CommandOptions, Vec<String>)> {
    let mut options = defaults;
    let mut args = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        if token == "--" {
            args.extend(iter);
            break;
        }

        let (flag, inline) = match token.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (token.clone(), None),
        };

        match flag.as_str() {
            "-f" | "--format" | "--as" => {
                let value = flag_value(&flag, inline, &mut iter)?;
                options.format = FormatType::parse(&value);
            }
            "-r" | "--repeat" => {
                let value = flag_value(&flag, inline, &mut iter)?;
                options.repeat = value
                    .parse::<u32>()
                    .map_err(|_| CliError::argument(format!("invalid repeat value: {}", value)))?
                    .max(1);
            }
            "-d" | "--delay" => {
                let value = flag_value(&flag, inline, &mut iter)?;
                let delay: f64 = value
                    .parse()
                    .map_err(|_| CliError::argument(format!("invalid delay value: {}", value)))?;
                if !delay.is_finite() || delay < 0.0 {
                    return Err(CliError::argument(format!("invalid delay value: {}", value)));
                }
                options.delay = delay;
            }
            "--no-color" => options.no_color = true,
            _ => args.push(token),
        }
    }

    Ok((options, args))
}

fn flag_value(
    flag: &str,
    inline: Option<String>,
    rest: &mut impl Iterator<Item = String>,
) -> Result<String> {
    inline
        .or_else(|| rest.next())
        .ok_or_else(|| CliError::argument(format!("expected argument for flag `{}`", flag)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &[&str]) -> Vec<String> {
        s.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_parse_simple() {
        let parts = parse_command("SET key value");
        assert_eq!(parts, vec!["SET", "key", "value"]);
    }

    #[test]
    fn test_parse_quoted() {
        let parts = parse_command(r#"SET key "hello world""#);
        assert_eq!(parts, vec!["SET", "key", "hello world"]);
    }

    #[test]
    fn test_parse_escaped() {
        let parts = parse_command(r#"SET key "hello\"world""#);
        assert_eq!(parts, vec!["SET", "key", "hello\"world"]);
    }

    #[test]
    fn test_parse_single_quotes_and_empty() {
        let parts = parse_command(r#"SET 'a "b"' """#);
        assert_eq!(parts, vec!["SET", "a \"b\"", ""]);
    }

    #[test]
    fn test_parse_quote_inside_token_is_literal() {
        let parts = parse_command(r#"SET it's x"#);
        assert_eq!(parts, vec!["SET", "it's", "x"]);
    }

    #[test]
    fn test_parse_escaped_space() {
        let parts = parse_command(r"GET my\ key");
        assert_eq!(parts, vec!["GET", "my key"]);
    }

    #[test]
    fn test_split_options_anywhere() {
        let (opts, args) =
            split_command_options(tokens(&["get", "-f", "json", "key", "-r", "3", "--delay=0.5"]), CommandOptions::default()).unwrap();
        assert_eq!(opts.format, FormatType::Json);
        assert_eq!(opts.repeat, 3);
        assert_eq!(opts.delay, 0.5);
        assert_eq!(args, vec!["get", "key"]);
    }

    #[test]
    fn test_split_keeps_unknown_flags() {
        let (opts, args) = split_command_options(tokens(&["set", "k", "-1", "--no-color"]), CommandOptions::default()).unwrap();
        assert!(opts.no_color);
        assert_eq!(args, vec!["set", "k", "-1"]);
    }

    #[test]
    fn test_split_double_dash() {
        let (opts, args) = split_command_options(tokens(&["-f", "raw", "--", "set", "k", "-r"]), CommandOptions::default()).unwrap();
        assert_eq!(opts.format, FormatType::Raw);
        assert_eq!(args, vec!["set", "k", "-r"]);
    }

    #[test]
    fn test_split_bad_values() {
        assert!(split_command_options(tokens(&["ping", "-r", "many"]), CommandOptions::default()).is_err());
        assert!(split_command_options(tokens(&["ping", "-d", "-1"]), CommandOptions::default()).is_err());
        assert!(split_command_options(tokens(&["ping", "-f"]), CommandOptions::default()).is_err());
    }

    #[test]
    fn test_split_respects_defaults() {
        let defaults = CommandOptions {
            format: FormatType::Json,
            cluster: true,
            ..CommandOptions::default()
        };
        let (opts, _) = split_command_options(tokens(&["get", "k"]), defaults.clone()).unwrap();
        assert_eq!(opts, defaults);

        let (opts, _) = split_command_options(tokens(&["get", "k", "-f", "normal"]), defaults).unwrap();
        assert_eq!(opts.format, FormatType::Normal);
        assert!(opts.cluster);
    }

    #[test]
    fn test_split_zero_repeat_is_one() {
        let (opts, _) = split_command_options(tokens(&["ping", "-r", "0"]), CommandOptions::default()).unwrap();
        assert_eq!(opts.repeat, 1);
    }

    #[test]
    fn test_is_cli_command() {
        assert!(is_cli_command("QUIT"));
        assert!(is_cli_command("help"));
        assert!(!is_cli_command("get"));
    }
}
