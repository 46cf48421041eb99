use clap::{Arg, ArgMatches, Command};
use std::error::Error;
use std::io::Write;
use std::io::{stdin, stdout};

use crate::models::Card;
use crate::store::{CollectionStore, Outcome};

pub async fn main(store: &CollectionStore) -> Result<(), Box<dyn Error>> {
    loop {
        let line = readline()?;
        if line.is_empty() {
            // EOF
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(store, line).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(stdout(), "{err}")?;
                stdout().flush()?;
            }
        }
    }

    Ok(())
}

fn words(matches: &ArgMatches, id: &str) -> String {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn value<'a>(matches: &'a ArgMatches, id: &str) -> &'a str {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .unwrap_or_default()
}

fn print_cards(cards: &[Card]) -> Result<(), Box<dyn Error>> {
    let mut out = stdout();
    for card in cards {
        writeln!(out, "{card}")?;
    }
    out.flush()?;
    Ok(())
}

async fn respond(store: &CollectionStore, line: &str) -> Result<bool, Box<dyn Error>> {
    let args = shlex::split(line).ok_or("error: Invalid quoting")?;
    let matches = cli().try_get_matches_from(args)?;
    let mut out = stdout();

    match matches.subcommand() {
        Some(("ping", _matches)) => {
            writeln!(out, "Pong")?;
        }
        Some(("quit", _matches)) => {
            writeln!(out, "Exiting ...")?;
            out.flush()?;
            return Ok(true);
        }
        Some(("signin", _matches)) => {
            writeln!(out, "Open {} and paste the redirect with `callback`", store.sign_in())?;
        }
        Some(("callback", matches)) => match store.consume_callback(value(matches, "url"))? {
            Some(location) => {
                writeln!(out, "Signed in, continue at {location}")?;
                store.load_collections().await?;
            }
            None => writeln!(out, "No sign-in parameters in that URL")?,
        },
        Some(("signout", _matches)) => {
            store.sign_out()?;
            writeln!(out, "Signed out")?;
        }
        Some(("whoami", _matches)) => match store.session().username() {
            Some(username) => writeln!(out, "{username}")?,
            None => writeln!(out, "Not signed in")?,
        },
        Some(("decks", _matches)) => {
            store.load_collections().await?;
            let selected = store.selected_collection_id();
            for collection in store.collections() {
                let marker = match collection.id.server_id() {
                    Some(id) if selected.as_deref() == Some(id) => '*',
                    _ => ' ',
                };
                writeln!(out, "{marker} {collection}")?;
            }
        }
        Some(("new", matches)) => {
            let created = store.add_collection(&words(matches, "name")).await?;
            writeln!(out, "Created {created}")?;
        }
        Some(("rename", matches)) => {
            store
                .rename_collection(value(matches, "id"), &words(matches, "name"))
                .await?;
            writeln!(out, "Renamed")?;
        }
        Some(("delete", matches)) => {
            store.remove_collection(value(matches, "id")).await?;
            writeln!(out, "Deleted")?;
        }
        Some(("select", matches)) => {
            let id = value(matches, "id");
            match store.select_collection(Some(id)).await? {
                Outcome::Applied => match store.selected_collection_id() {
                    Some(selected) => writeln!(
                        out,
                        "Selected {selected}: {} cards, €{:.2}",
                        store.card_count(),
                        store.total_price()
                    )?,
                    None => writeln!(out, "Deselected {id}")?,
                },
                Outcome::Superseded => writeln!(out, "Selection changed while loading {id}")?,
            }
        }
        Some(("deselect", _matches)) => {
            store.select_collection(None).await?;
        }
        Some(("cards", matches)) => {
            let cards = store.filter_cards(&words(matches, "filter"));
            print_cards(&cards)?;
            writeln!(
                out,
                "{} cards, €{:.2}",
                store.card_count(),
                store.total_price()
            )?;
        }
        Some(("search", matches)) => {
            print_cards(&store.search_cards(&words(matches, "query")).await?)?;
        }
        Some(("prints", matches)) => {
            print_cards(&store.fetch_prints(&words(matches, "name")).await?)?;
        }
        Some(("random", _matches)) => {
            let card = store.random_card().await?;
            writeln!(out, "{card}")?;
            writeln!(out, "{}", card.oracle_text)?;
        }
        Some(("add", matches)) => {
            let card = store
                .add_card_to_selected(
                    value(matches, "name"),
                    value(matches, "set"),
                    value(matches, "number"),
                )
                .await?;
            writeln!(out, "Added {card}")?;
        }
        Some(("remove", matches)) => {
            store.remove_card(value(matches, "card")).await?;
            writeln!(out, "Removed")?;
        }
        Some(("print", matches)) => {
            let card = store
                .change_card_print(value(matches, "card"), value(matches, "print"))
                .await?;
            writeln!(out, "Now {card}")?;
        }
        Some(("rulings", matches)) => {
            let rulings = store.load_rulings(value(matches, "card")).await?;
            if rulings.is_empty() {
                writeln!(out, "No rulings")?;
            }
            for ruling in rulings {
                writeln!(out, "- {ruling}")?;
            }
        }
        Some((name, _matches)) => {
            return Err(format!("error: Invalid command {name}").into());
        }
        None => unreachable!("subcommand required"),
    }

    out.flush()?;
    Ok(false)
}

fn cli() -> Command {
    // strip out usage
    const PARSER_TEMPLATE: &str = "\
        {all-args}
    ";
    // strip out name/version
    const COMMAND_TEMPLATE: &str = "\
        {about-with-newline}\n\
        {usage-heading}\n    {usage}\n\
        \n\
        {all-args}{after-help}\
    ";

    let command = |name: &'static str, about: &'static str| {
        Command::new(name)
            .about(about)
            .help_template(COMMAND_TEMPLATE)
    };
    let required = |id: &'static str| Arg::new(id).required(true);
    let rest = |id: &'static str| Arg::new(id).num_args(1..).trailing_var_arg(true);

    Command::new("repl")
        .multicall(true)
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand_value_name("COMMAND")
        .subcommand_help_heading("COMMANDS")
        .help_template(PARSER_TEMPLATE)
        .subcommand(command("ping", "Get a response"))
        .subcommand(command("signin", "Show where to sign in"))
        .subcommand(
            command("callback", "Finish sign-in with the redirect URL").arg(required("url")),
        )
        .subcommand(command("signout", "Forget the signed-in user"))
        .subcommand(command("whoami", "Show the signed-in user"))
        .subcommand(command("decks", "List collections").alias("ls"))
        .subcommand(command("new", "Create a collection").arg(rest("name").required(true)))
        .subcommand(
            command("rename", "Rename a collection")
                .arg(required("id"))
                .arg(rest("name").required(true)),
        )
        .subcommand(command("delete", "Delete a collection").arg(required("id")))
        .subcommand(
            command("select", "Show a collection; again to hide it").arg(required("id")),
        )
        .subcommand(command("deselect", "Hide the shown collection"))
        .subcommand(command("cards", "List cards, optionally filtered").arg(rest("filter")))
        .subcommand(command("search", "Search the card database").arg(rest("query").required(true)))
        .subcommand(command("prints", "List every printing of a card").arg(rest("name").required(true)))
        .subcommand(command("random", "Show a random card"))
        .subcommand(
            command("add", "Add a printing to the shown collection")
                .arg(required("name"))
                .arg(required("set"))
                .arg(required("number")),
        )
        .subcommand(command("remove", "Remove a card from the shown collection").arg(required("card")))
        .subcommand(
            command("print", "Switch a card to another printing")
                .arg(required("card"))
                .arg(required("print")),
        )
        .subcommand(command("rulings", "Show a card's rulings").arg(required("card")))
        .subcommand(
            command("quit", "Quit the REPL")
                .alias("exit")
                .alias("q")
                .alias(":q"),
        )
}

fn readline() -> Result<String, Box<dyn Error>> {
    write!(stdout(), "> ")?;
    stdout().flush()?;
    let mut buffer = String::new();
    stdin().read_line(&mut buffer)?;
    Ok(buffer)
}
