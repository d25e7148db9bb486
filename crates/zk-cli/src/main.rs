//! CLI entry point for the zk note store.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use zk_core::{
    app_data_dir, get_current_note, get_editor, get_store_root, set_current_note, set_store_root,
    NoteMeta, Search, Store, ROOT_ID,
};

#[derive(Parser)]
#[command(name = "zk")]
#[command(about = "zk: a hierarchical note store")]
struct Cli {
    /// Store root (defaults to the configured root, else ~/zk).
    #[arg(long, global = true, value_name = "PATH")]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create a new, empty store.
    Init,
    /// Show a note's title and its subnotes.
    #[command(alias = "s")]
    Show { note: Option<String> },
    /// Move to the current note's parent and show it.
    #[command(alias = "u")]
    Up,
    /// Create a note; the body is read from stdin, its first line is the title.
    #[command(alias = "n")]
    New {
        /// Parent note (default: the top-level note).
        parent: Option<String>,
    },
    /// Edit a note's body in the configured editor.
    #[command(alias = "e")]
    Edit { note: String },
    /// Print a note's body.
    #[command(alias = "p")]
    Print { note: Option<String> },
    /// Print the note tree.
    #[command(alias = "t")]
    Tree {
        note: Option<String>,
        /// Dump the whole index as JSON instead.
        #[arg(long)]
        json: bool,
    },
    /// List NOTE as a subnote of PARENT.
    Link { note: String, parent: String },
    /// Remove NOTE from PARENT's subnotes.
    Unlink { note: String, parent: String },
    /// Attach a file to a note.
    Addfile {
        note: String,
        path: PathBuf,
        /// Name to store the file under (default: the source's base name).
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Remove an attached file.
    Rmfile { note: String, name: String },
    /// List a note's attached files.
    #[command(alias = "listfiles")]
    Ls { note: Option<String> },
    /// List notes that are nobody's subnote.
    Orphans,
    /// Rebuild the index from the note directories.
    Rescan,
    /// Search note bodies for a regular expression.
    Grep {
        pattern: String,
        /// Restrict to these notes.
        notes: Vec<String>,
    },
    /// Search a note and everything below it.
    Tgrep { pattern: String, note: Option<String> },
    /// Manage aliases.
    #[command(subcommand)]
    Alias(AliasCommand),
    /// Remember a store root in the config file.
    SetRoot { path: PathBuf },
    /// Show where zk stores its config.
    DataDir,
    /// `zk <note>`: make that note current and show it.
    #[command(external_subcommand)]
    Goto(Vec<String>),
}

#[derive(clap::Subcommand)]
enum AliasCommand {
    /// Bind NAME to NOTE.
    Add { note: String, name: String },
    /// Remove an alias.
    Rm { name: String },
    /// List aliases.
    List,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn run(cli: Cli) -> CliResult {
    let command = cli.command.unwrap_or(Commands::Show { note: None });
    match &command {
        Commands::DataDir => {
            match app_data_dir() {
                Some(p) => println!("{}", p.display()),
                None => eprintln!("Could not determine app data directory."),
            }
            return Ok(());
        }
        Commands::SetRoot { path } => {
            set_store_root(path)?;
            return Ok(());
        }
        Commands::Goto(args) if args.len() != 1 => {
            return Err(format!("expected one note, got `{}`", args.join(" ")).into());
        }
        _ => {}
    }

    let root = cli
        .root
        .or_else(get_store_root)
        .ok_or("could not determine a store root; pass --root")?;
    if let Commands::Init = command {
        let store = Store::init(&root)?;
        println!("Initialized store at {}", store.root().display());
        if let Err(e) = set_current_note(ROOT_ID) {
            log::warn!("cannot reset the current note: {e}");
        }
        return store.close().map_err(Into::into);
    }

    let mut store = Store::open(&root)?;
    dispatch(&mut store, command)?;
    store.close()?;
    Ok(())
}

/// Resolves a note argument. Without one, the current note, or the top level
/// if the current note is gone.
fn note_arg(store: &Store, arg: Option<&str>) -> Result<u64, zk_core::StoreError> {
    match arg {
        Some(a) => store.resolve(a),
        None => Ok(current_note(store)),
    }
}

fn current_note(store: &Store) -> u64 {
    get_current_note()
        .filter(|id| store.metadata_dump().contains_key(id))
        .unwrap_or(ROOT_ID)
}

fn change_note(store: &mut Store, id: u64) -> CliResult {
    set_current_note(id)?;
    show(store, id)
}

fn show(store: &mut Store, id: u64) -> CliResult {
    let note = store.get_note(id)?;
    let mut subnotes = Vec::new();
    for sn in &note.meta.subnotes {
        subnotes.push(store.get_note(*sn)?.meta);
    }
    subnotes.sort_by_key(|m| m.id);
    println!("{} {}", note.meta.id, note.meta.title);
    for sn in subnotes {
        println!("\t{} {}", sn.id, sn.title);
    }
    Ok(())
}

fn dispatch(store: &mut Store, command: Commands) -> CliResult {
    match command {
        Commands::Show { note } => {
            let id = note_arg(store, note.as_deref())?;
            show(store, id)?;
        }
        Commands::Up => {
            let parent = store.get_meta(current_note(store))?.parent;
            change_note(store, parent)?;
        }
        Commands::Goto(args) => {
            let note = args.first().ok_or("expected a note")?;
            let id = store.resolve(note)?;
            change_note(store, id)?;
        }
        Commands::New { parent } => {
            let parent = note_arg(store, parent.as_deref())?;
            eprintln!("Enter note; the first line will be the title. Ctrl-D when done.");
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            let id = store.create_note(parent, &body)?;
            println!("{id}");
        }
        Commands::Edit { note } => {
            let id = store.resolve(&note)?;
            let path = store.get_body_path(id)?;
            let editor = get_editor();
            let status = std::process::Command::new(&editor).arg(&path).status()?;
            if !status.success() {
                return Err(format!("{editor} exited with {status}").into());
            }
            store.get_note(id)?;
        }
        Commands::Print { note } => {
            let id = note_arg(store, note.as_deref())?;
            print!("{}", store.get_note(id)?.body);
        }
        Commands::Tree { note, json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(store.metadata_dump())?);
            } else {
                let id = note_arg(store, note.as_deref())?;
                print_tree(store, id, 0, &mut Vec::new());
            }
        }
        Commands::Link { note, parent } => {
            let (id, parent) = (store.resolve(&note)?, store.resolve(&parent)?);
            store.link_note(parent, id)?;
        }
        Commands::Unlink { note, parent } => {
            let (id, parent) = (store.resolve(&note)?, store.resolve(&parent)?);
            store.unlink_note(parent, id)?;
        }
        Commands::Addfile { note, path, name } => {
            let id = store.resolve(&note)?;
            store.add_file(id, &path, &name)?;
            print_files(&store.get_meta(id)?);
        }
        Commands::Rmfile { note, name } => {
            let id = store.resolve(&note)?;
            store.remove_file(id, &name)?;
        }
        Commands::Ls { note } => {
            let id = note_arg(store, note.as_deref())?;
            print_files(&store.get_note(id)?.meta);
        }
        Commands::Orphans => {
            for meta in store.get_orphans() {
                println!("{} {}", meta.id, meta.title);
            }
        }
        Commands::Rescan => {
            store.rescan()?;
            println!("{} note(s)", store.metadata_dump().len());
        }
        Commands::Grep { pattern, notes } => {
            let ids = notes
                .iter()
                .map(|n| store.resolve(n))
                .collect::<Result<Vec<_>, _>>()?;
            print_results(store.search(&pattern, &ids)?);
        }
        Commands::Tgrep { pattern, note } => {
            let id = note_arg(store, note.as_deref())?;
            print_results(store.tree_search(&pattern, id)?);
        }
        Commands::Alias(AliasCommand::Add { note, name }) => {
            let id = store.resolve(&note)?;
            store.add_alias(id, &name)?;
        }
        Commands::Alias(AliasCommand::Rm { name }) => store.remove_alias(&name)?,
        Commands::Alias(AliasCommand::List) => {
            for (name, id) in store.aliases() {
                println!("{name}\t{id}");
            }
        }
        Commands::Init | Commands::SetRoot { .. } | Commands::DataDir => {}
    }
    Ok(())
}

fn print_tree(store: &Store, id: u64, depth: usize, path: &mut Vec<u64>) {
    let Some(meta) = store.metadata_dump().get(&id) else {
        return;
    };
    println!("{}{} {}", "\t".repeat(depth), meta.id, meta.title);
    path.push(id);
    for &sn in &meta.subnotes {
        if !path.contains(&sn) {
            print_tree(store, sn, depth + 1, path);
        }
    }
    path.pop();
}

fn print_files(meta: &NoteMeta) {
    println!("Files for [{}] {}:", meta.id, meta.title);
    for f in &meta.files {
        println!("\t{f}");
    }
}

fn print_results(results: Search) {
    for result in results {
        match result {
            Ok(hit) => println!("{} {}:{}: {}", hit.note.id, hit.note.title, hit.line_number, hit.line),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_note_parses_as_goto() {
        let cli = Cli::try_parse_from(["zk", "5"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Goto(args)) if args == ["5"]));

        let cli = Cli::try_parse_from(["zk", "inbox"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Goto(args)) if args == ["inbox"]));
    }

    #[test]
    fn up_has_short_alias() {
        let cli = Cli::try_parse_from(["zk", "u"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Up)));
        let cli = Cli::try_parse_from(["zk", "s", "3"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Show { note: Some(n) }) if n == "3"));
    }

    #[test]
    fn note_arg_falls_back_to_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::init(dir.path().join("zk")).unwrap();
        let id = store.create_note(ROOT_ID, "A\n").unwrap();
        assert_eq!(note_arg(&store, Some("1")).unwrap(), id);
        assert!(note_arg(&store, Some("9")).is_err());
        let fallback = note_arg(&store, None).unwrap();
        assert!(fallback == ROOT_ID || store.metadata_dump().contains_key(&fallback));
    }
}
