use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{OutputMode, OutputTarget, Pipeline, Stage};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    EmptyCommand,
    #[error("missing redirect target")]
    MissingRedirectTarget,
    #[error("background execution is not supported")]
    Background,
    #[error("unexpected character: '{0}'")]
    Unexpected(char),
}

struct Parser<'a> {
    line: &'a [u8],
    i: usize,
}

impl<'a> Parser<'a> {
    fn proceed_while<F>(&mut self, f: F)
    where
        F: Fn(u8) -> bool,
    {
        while let Some(c) = self.line.get(self.i) {
            if !f(*c) {
                break;
            }
            self.i += 1;
        }
    }

    fn is_whitespace(c: u8) -> bool {
        matches!(c, b' ' | b'\t' | b'\n')
    }

    fn is_word(c: u8) -> bool {
        match c {
            b'>' | b'<' | b'&' | b'|' => false,
            _ => !Parser::is_whitespace(c),
        }
    }

    fn skip_whitespaces(&mut self) {
        self.proceed_while(Parser::is_whitespace);
    }

    fn read_word(&mut self) -> OsString {
        let orig = self.i;
        self.proceed_while(Parser::is_word);
        std::ffi::OsStr::from_bytes(&self.line[orig..self.i]).to_os_string()
    }

    fn redirect_target(&mut self) -> Result<OsString, ParseError> {
        self.skip_whitespaces();
        let word = self.read_word();
        if word.is_empty() {
            Err(ParseError::MissingRedirectTarget)
        } else {
            Ok(word)
        }
    }

    fn parse_stage(&mut self) -> Result<Stage, ParseError> {
        let mut argv: Vec<OsString> = vec![];
        let mut stdin_file = None;
        let mut stdout_file = None;

        loop {
            self.skip_whitespaces();
            match self.line.get(self.i) {
                Some(&b'<') => {
                    self.i += 1;
                    stdin_file = Some(PathBuf::from(self.redirect_target()?));
                }
                Some(&b'>') => {
                    let mode = if self.line.get(self.i + 1) == Some(&b'>') {
                        self.i += 2;
                        OutputMode::Append
                    } else {
                        self.i += 1;
                        OutputMode::Truncate
                    };
                    stdout_file = Some(OutputTarget {
                        path: PathBuf::from(self.redirect_target()?),
                        mode,
                    });
                }
                Some(&b'|') | Some(&b'&') | None => break,
                Some(_) => argv.push(self.read_word()),
            }
        }

        if argv.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        Ok(Stage { argv, stdin_file, stdout_file })
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let mut stages: Vec<Stage> = vec![];
        loop {
            stages.push(self.parse_stage()?);
            match self.line.get(self.i) {
                Some(&b'|') => {
                    self.i += 1;
                }
                Some(&b'&') => {
                    return Err(ParseError::Background);
                }
                Some(&c) => {
                    return Err(ParseError::Unexpected(c as char));
                }
                None => {
                    break;
                }
            }
        }
        Ok(Pipeline { stages })
    }
}

pub fn parse(line: &str) -> Result<Pipeline, ParseError> {
    let mut parser = Parser { line: line.as_bytes(), i: 0 };
    parser.parse_pipeline()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn single_command_with_arguments() {
        let pipeline = parse("echo hello world\n").unwrap();
        assert_eq!(pipeline.stages.len(), 1);
        assert_eq!(pipeline.stages[0].argv, words(&["echo", "hello", "world"]));
        assert_eq!(pipeline.stages[0].stdin_file, None);
        assert_eq!(pipeline.stages[0].stdout_file, None);
    }

    #[test]
    fn three_stage_pipeline() {
        let pipeline = parse("ls -l | grep foo | wc -l").unwrap();
        assert_eq!(pipeline.stages.len(), 3);
        assert_eq!(pipeline.stages[0].argv, words(&["ls", "-l"]));
        assert_eq!(pipeline.stages[1].argv, words(&["grep", "foo"]));
        assert_eq!(pipeline.stages[2].argv, words(&["wc", "-l"]));
    }

    #[test]
    fn redirections_attach_to_their_stage() {
        let pipeline = parse("sort < in.txt | uniq > out.txt").unwrap();
        assert_eq!(pipeline.stages[0].stdin_file, Some(PathBuf::from("in.txt")));
        assert_eq!(pipeline.stages[0].stdout_file, None);
        assert_eq!(pipeline.stages[1].stdin_file, None);
        assert_eq!(
            pipeline.stages[1].stdout_file,
            Some(OutputTarget { path: PathBuf::from("out.txt"), mode: OutputMode::Truncate })
        );
    }

    #[test]
    fn double_angle_appends() {
        let pipeline = parse("echo x >> log").unwrap();
        assert_eq!(
            pipeline.stages[0].stdout_file,
            Some(OutputTarget { path: PathBuf::from("log"), mode: OutputMode::Append })
        );
    }

    #[test]
    fn redirect_may_precede_the_command_name() {
        let pipeline = parse("< in.txt cat").unwrap();
        assert_eq!(pipeline.stages[0].argv, words(&["cat"]));
        assert_eq!(pipeline.stages[0].stdin_file, Some(PathBuf::from("in.txt")));
    }

    #[test]
    fn later_redirect_of_the_same_direction_wins() {
        let pipeline = parse("cat > a > b").unwrap();
        assert_eq!(
            pipeline.stages[0].stdout_file,
            Some(OutputTarget { path: PathBuf::from("b"), mode: OutputMode::Truncate })
        );
    }

    #[test]
    fn empty_commands_are_rejected() {
        assert_eq!(parse("").unwrap_err(), ParseError::EmptyCommand);
        assert_eq!(parse("   \n").unwrap_err(), ParseError::EmptyCommand);
        assert_eq!(parse("a | | b").unwrap_err(), ParseError::EmptyCommand);
        assert_eq!(parse("a |").unwrap_err(), ParseError::EmptyCommand);
    }

    #[test]
    fn missing_redirect_target_is_rejected() {
        assert_eq!(parse("cat <").unwrap_err(), ParseError::MissingRedirectTarget);
        assert_eq!(parse("cat > | wc").unwrap_err(), ParseError::MissingRedirectTarget);
    }

    #[test]
    fn background_marker_is_rejected() {
        assert_eq!(parse("sleep 10 &").unwrap_err(), ParseError::Background);
    }
}
