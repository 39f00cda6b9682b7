//! A simple CLI tool for verifying tally dumps.
//! This uses the server's own verification implementation, and is by definition
//! compatible with the output of the dump endpoint.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use tally_backend::model::api::dump::{TallyDump, VerificationError};

const PROGRAM_NAME: &str = "tally-verify";

const ABOUT_TEXT: &str = "Verify the integrity of a vote tally dump.

EXIT CODES:
     0: Verification succeeded.
   255: Ran successfully, but verification failed.
 Other: Error.";

const DUMP_PATH: &str = "DUMP_PATH";

const DUMP_PATH_HELP: &str = "The path to a JSON dump of every record,\n\
as returned by `GET /api/dump`";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(DUMP_PATH)
            .help(DUMP_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// Verification failed due to the contained reason.
    Verification(VerificationError),
}

/// The verified results for a particular candidate.
#[derive(Debug, Eq, PartialEq)]
struct FriendlyResults {
    pub candidate_name: String,
    pub party: Option<String>,
    pub votes: u32,
}

impl Display for FriendlyResults {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.candidate_name)?;
        if let Some(party) = &self.party {
            write!(f, " ({party})")?;
        }
        write!(
            f,
            ": {} vote{}",
            self.votes,
            if self.votes != 1 { "s" } else { "" }
        )
    }
}

/// A summary of a verified dump.
#[derive(Debug, Eq, PartialEq)]
struct Summary {
    pub results: Vec<FriendlyResults>,
    pub voters: usize,
    pub voted: usize,
    pub orphaned_votes: usize,
}

/// Run verification.
fn verify(path: &str) -> Result<Summary, Error> {
    // Load the file.
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let dump: TallyDump =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    // Run verification.
    dump.verify().map_err(Error::Verification)?;

    // Turn into a list ordered by votes, then name.
    let mut results = dump
        .candidates
        .iter()
        .map(|candidate| FriendlyResults {
            candidate_name: candidate.name.clone(),
            party: candidate.party.clone(),
            votes: candidate.votes,
        })
        .collect::<Vec<_>>();
    results.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then_with(|| a.candidate_name.cmp(&b.candidate_name))
    });

    Ok(Summary {
        results,
        voters: dump.voters.len(),
        voted: dump.voters.iter().filter(|v| v.has_voted).count(),
        orphaned_votes: dump.orphaned_votes(),
    })
}

/// Run verification, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(DUMP_PATH).unwrap(); // Required argument is guaranteed to be present.
    match verify(path) {
        Ok(summary) => {
            println!("Verification succeeded.");
            println!("{} of {} voters have voted.", summary.voted, summary.voters);
            for result in summary.results {
                println!("{}", result);
            }
            if summary.orphaned_votes > 0 {
                println!(
                    "{} vote{} for deleted candidates not counted.",
                    summary.orphaned_votes,
                    if summary.orphaned_votes != 1 { "s" } else { "" }
                );
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {}", msg);
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {}", msg);
            1
        }
        Err(Error::Verification(err)) => {
            println!("Verification failed: {}", err);
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification() {
        // This test actually enters backend code, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["tally_backend"], None, None);

        let expected = Summary {
            results: vec![
                FriendlyResults {
                    candidate_name: "Bob".to_string(),
                    party: Some("PartyX".to_string()),
                    votes: 2,
                },
                FriendlyResults {
                    candidate_name: "Dave".to_string(),
                    party: None,
                    votes: 1,
                },
                FriendlyResults {
                    candidate_name: "Erin".to_string(),
                    party: Some("PartyY".to_string()),
                    votes: 0,
                },
            ],
            voters: 4,
            voted: 3,
            orphaned_votes: 0,
        };
        assert_eq!(verify("example_dumps/tally.json"), Ok(expected));

        let expected = Summary {
            results: vec![FriendlyResults {
                candidate_name: "Dave".to_string(),
                party: None,
                votes: 1,
            }],
            voters: 2,
            voted: 2,
            orphaned_votes: 1,
        };
        assert_eq!(
            verify("example_dumps/tally_deleted_candidate.json"),
            Ok(expected)
        );

        assert_eq!(
            verify("example_dumps/tally_wrong_count.json"),
            Err(Error::Verification(VerificationError::Tally {
                candidate_id: 2,
                reported: 2,
                counted: 1,
            }))
        );

        assert_eq!(
            verify("example_dumps/tally_voter_state.json"),
            Err(Error::Verification(VerificationError::VoterState {
                voter_id: 2,
                has_voted: false,
            }))
        );

        assert!(matches!(
            verify("example_dumps/malformed.json"),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            verify("example_dumps/does_not_exist.json"),
            Err(Error::IO(_))
        ));
    }

    #[test]
    fn display() {
        let result = FriendlyResults {
            candidate_name: "Bob".to_string(),
            party: Some("PartyX".to_string()),
            votes: 1,
        };
        assert_eq!(result.to_string(), "Bob (PartyX): 1 vote");
        let result = FriendlyResults {
            candidate_name: "Dave".to_string(),
            party: None,
            votes: 3,
        };
        assert_eq!(result.to_string(), "Dave: 3 votes");
    }
}
