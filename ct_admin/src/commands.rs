use card_table::{
    CardId, CardResult, CardTable, CardValue,
    cards::{NO_TOKEN, TokenId},
};
use pico_args::Arguments;
use serde_json::{Value, json};
use std::fmt;

/// Errors that can occur during command parsing.
#[derive(Debug)]
pub enum ParseError {
    /// No command given.
    MissingCommand,
    /// Unrecognized command.
    UnrecognizedCommand(String),
    /// Missing or malformed argument.
    Arguments(pico_args::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCommand => write!(f, "No command given. Run with --help for usage"),
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{}'. Run with --help to see available commands",
                cmd
            ),
            Self::Arguments(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<pico_args::Error> for ParseError {
    fn from(e: pico_args::Error) -> Self {
        Self::Arguments(e)
    }
}

/// One administrative action against the card store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Schema,
    Register {
        value: CardValue,
        token_id: TokenId,
        metadata_uri: String,
    },
    Card {
        id: CardId,
    },
    Deal {
        address: String,
    },
    Decks {
        table: String,
    },
    Cards {
        table: String,
        deck: String,
    },
    Draw {
        table: String,
        from: String,
        to: String,
    },
    ClearOwned {
        address: String,
    },
}

impl AdminCommand {
    /// Parse the subcommand and its arguments.
    ///
    /// `--token` and `--uri` only apply to `register` and are ignored otherwise.
    pub fn parse(pargs: &mut Arguments) -> Result<Self, ParseError> {
        let token_id: Option<TokenId> = pargs.opt_value_from_str("--token")?;
        let metadata_uri: Option<String> = pargs.opt_value_from_str("--uri")?;

        let command = pargs.subcommand()?.ok_or(ParseError::MissingCommand)?;
        match command.as_str() {
            "schema" => Ok(Self::Schema),
            "register" => Ok(Self::Register {
                value: pargs.free_from_str()?,
                token_id: token_id.unwrap_or(NO_TOKEN),
                metadata_uri: metadata_uri.unwrap_or_default(),
            }),
            "card" => Ok(Self::Card {
                id: pargs.free_from_str()?,
            }),
            "deal" => Ok(Self::Deal {
                address: pargs.free_from_str()?,
            }),
            "decks" => Ok(Self::Decks {
                table: pargs.free_from_str()?,
            }),
            "cards" => Ok(Self::Cards {
                table: pargs.free_from_str()?,
                deck: pargs.free_from_str()?,
            }),
            "draw" => Ok(Self::Draw {
                table: pargs.free_from_str()?,
                from: pargs.free_from_str()?,
                to: pargs.free_from_str()?,
            }),
            "clear-owned" => Ok(Self::ClearOwned {
                address: pargs.free_from_str()?,
            }),
            _ => Err(ParseError::UnrecognizedCommand(command)),
        }
    }

    /// Whether the command needs the store tables created beforehand
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema)
    }
}

/// Run a command and return its JSON result.
pub async fn run(table: &CardTable, command: AdminCommand) -> CardResult<Value> {
    match command {
        AdminCommand::Schema => Ok(json!({ "schema": "ready" })),
        AdminCommand::Register {
            value,
            token_id,
            metadata_uri,
        } => {
            let card = table.registry().register(value, token_id, metadata_uri).await?;
            Ok(json!(card))
        }
        AdminCommand::Card { id } => Ok(json!(table.registry().get(id).await?)),
        AdminCommand::Deal { address } => {
            Ok(json!(table.dealer().get_shuffled_deck(&address).await?))
        }
        AdminCommand::Decks { table: table_id } => {
            Ok(json!(table.decks().get_decks(&table_id).await?))
        }
        AdminCommand::Cards {
            table: table_id,
            deck,
        } => Ok(json!(table.decks().get_cards(&table_id, &deck).await?)),
        AdminCommand::Draw {
            table: table_id,
            from,
            to,
        } => {
            let source = table.decks().init_deck(&table_id, &from).await?;
            let destination = table.decks().init_deck(&table_id, &to).await?;
            Ok(json!(source.draw_card(&destination).await?))
        }
        AdminCommand::ClearOwned { address } => {
            table.ownership().clear_owned(&address).await?;
            Ok(json!({ "cleared": address }))
        }
    }
}
