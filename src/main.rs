//! twig CLI - content-addressed version control

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use twig::ignore::IgnoreRules;
use twig::ops;
use twig::{
    object_find, object_read, object_write, ref_list, Index, Kind, Object, Repo, Signature,
};

#[derive(Parser)]
#[command(name = "twig")]
#[command(about = "content-addressed version control storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize a new, empty repository
    Init {
        /// where to create the repository
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// print the content of a repository object
    CatFile {
        /// object type (blob, tree, commit, tag)
        #[arg(value_name = "type")]
        object_type: String,

        /// the object to display
        object: String,
    },

    /// compute an object digest and optionally store the object
    HashObject {
        /// object type
        #[arg(short = 't', default_value = "blob")]
        object_type: String,

        /// actually write the object into the store
        #[arg(short = 'w')]
        write: bool,

        /// read the object from this file
        path: PathBuf,
    },

    /// display commit history as a graphviz digraph
    Log {
        /// commit to start at
        #[arg(default_value = "HEAD")]
        commit: String,
    },

    /// pretty-print a tree object
    LsTree {
        /// recurse into sub-trees
        #[arg(short = 'r')]
        recursive: bool,

        /// a tree-ish object
        tree: String,
    },

    /// checkout a commit inside an empty directory
    Checkout {
        /// the commit or tree to checkout
        commit: String,

        /// the empty directory to checkout into
        path: PathBuf,
    },

    /// list references
    ShowRef,

    /// list and create tags
    Tag {
        /// create an annotated tag object
        #[arg(short = 'a')]
        annotate: bool,

        /// the new tag's name
        name: Option<String>,

        /// the object the new tag will point to
        #[arg(default_value = "HEAD")]
        object: String,

        /// tag message (annotated tags)
        #[arg(short = 'm', default_value = "")]
        message: String,
    },

    /// resolve a name to an object digest
    RevParse {
        /// expected object type
        #[arg(long = "type", value_name = "type")]
        object_type: Option<String>,

        /// the name to parse
        name: String,
    },

    /// list staged files
    LsFiles {
        /// show metadata for every entry
        #[arg(long)]
        verbose: bool,
    },

    /// check paths against ignore rules
    CheckIgnore {
        /// paths to check
        #[arg(required = true)]
        path: Vec<String>,
    },

    /// show the working tree status
    Status,

    /// remove files from the working tree and the index
    Rm {
        /// files to remove
        #[arg(required = true)]
        path: Vec<PathBuf>,
    },

    /// add file contents to the index
    Add {
        /// files to add
        #[arg(required = true)]
        path: Vec<PathBuf>,
    },

    /// record changes to the repository
    Commit {
        /// message to associate with this commit
        #[arg(short = 'm')]
        message: String,

        /// override the configured author ("Name <email>")
        #[arg(long)]
        author: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> twig::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            let repo = Repo::init(&path)?;
            println!(
                "initialized empty twig repository in {}",
                repo.gitdir().display()
            );
        }

        Commands::CatFile {
            object_type,
            object,
        } => {
            let repo = Repo::discover(Path::new("."))?;
            let kind = Kind::from_name(&object_type)?;
            let hash = object_find(&repo, &object, Some(kind), true)?;
            let obj = object_read(&repo, &hash)?;
            io::stdout()
                .write_all(&obj.serialize())
                .map_err(|e| twig::Error::Io {
                    path: "stdout".into(),
                    source: e,
                })?;
        }

        Commands::HashObject {
            object_type,
            write,
            path,
        } => {
            let kind = Kind::from_name(&object_type)?;
            let data = std::fs::read(&path).map_err(|e| twig::Error::Io {
                path: path.clone(),
                source: e,
            })?;
            let obj = Object::parse(kind, &data)?;

            let hash = if write {
                let repo = Repo::discover(Path::new("."))?;
                object_write(&repo, &obj)?
            } else {
                twig::hash_object(&obj)
            };
            println!("{}", hash);
        }

        Commands::Log { commit } => {
            let repo = Repo::discover(Path::new("."))?;
            let entries = ops::log(&repo, &commit)?;

            println!("digraph twiglog{{");
            println!("  node[shape=rect]");
            for entry in &entries {
                let message = String::from_utf8_lossy(entry.commit.message());
                let message = message.trim().replace('\\', "\\\\").replace('"', "\\\"");
                let first_line = message.lines().next().unwrap_or("");
                println!(
                    "  c_{} [label=\"{}: {}\"]",
                    entry.hash,
                    &entry.hash.to_hex()[..7],
                    first_line
                );
                for parent in entry.commit.parents()? {
                    println!("  c_{} -> c_{};", entry.hash, parent);
                }
            }
            println!("}}");
        }

        Commands::LsTree { recursive, tree } => {
            let repo = Repo::discover(Path::new("."))?;
            for row in ops::ls_tree(&repo, &tree, recursive)? {
                println!(
                    "{} {} {}\t{}",
                    row.mode,
                    row.target.name(),
                    row.hash,
                    row.path
                );
            }
        }

        Commands::Checkout { commit, path } => {
            let repo = Repo::discover(Path::new("."))?;
            ops::checkout(&repo, &commit, &path)?;
        }

        Commands::ShowRef => {
            let repo = Repo::discover(Path::new("."))?;
            for (name, resolved) in ref_list(&repo)? {
                if let Some(hash) = resolved {
                    println!("{} {}", hash, name);
                }
            }
        }

        Commands::Tag {
            annotate,
            name,
            object,
            message,
        } => {
            let repo = Repo::discover(Path::new("."))?;
            match name {
                Some(name) => {
                    let _lock = repo.lock()?;
                    ops::tag_create(&repo, &name, &object, annotate, None, &message)?;
                }
                None => {
                    for (ref_name, resolved) in ref_list(&repo)? {
                        if let Some(short) = ref_name.strip_prefix("refs/tags/") {
                            if resolved.is_some() {
                                println!("{}", short);
                            }
                        }
                    }
                }
            }
        }

        Commands::RevParse { object_type, name } => {
            let repo = Repo::discover(Path::new("."))?;
            let kind = object_type.as_deref().map(Kind::from_name).transpose()?;
            println!("{}", object_find(&repo, &name, kind, true)?);
        }

        Commands::LsFiles { verbose } => {
            let repo = Repo::discover(Path::new("."))?;
            let index = Index::read(&repo)?;
            if verbose {
                println!(
                    "index file format v{}, containing {} entries",
                    index.version,
                    index.entries.len()
                );
            }
            for entry in &index.entries {
                println!("{}", entry.name);
                if verbose {
                    println!("  {:?} with perms: {:o}", entry.kind, entry.perms);
                    println!("  on blob: {}", entry.hash);
                    println!(
                        "  created: {}.{}, modified: {}.{}",
                        entry.ctime.0, entry.ctime.1, entry.mtime.0, entry.mtime.1
                    );
                    println!("  device: {}, inode: {}", entry.dev, entry.ino);
                    println!("  user: {}  group: {}", entry.uid, entry.gid);
                    println!(
                        "  flags: stage={} assume_valid={}",
                        entry.stage, entry.assume_valid
                    );
                }
            }
        }

        Commands::CheckIgnore { path } => {
            let repo = Repo::discover(Path::new("."))?;
            let rules = IgnoreRules::load(&repo)?;
            for p in path {
                if rules.is_ignored(&p) {
                    println!("{}", p);
                }
            }
        }

        Commands::Status => {
            let repo = Repo::discover(Path::new("."))?;
            let st = ops::status(&repo)?;

            match (&st.branch, &st.head) {
                (Some(branch), _) => println!("On branch {}.", branch),
                (None, Some(head)) => println!("HEAD detached at {}", head),
                (None, None) => println!("HEAD detached at an unborn state"),
            }

            println!("Changes to be committed:");
            print_changes(&st.staged);

            println!();
            println!("Changes not staged for commit:");
            print_changes(&st.unstaged);

            println!();
            println!("Untracked files:");
            for path in &st.untracked {
                println!("  {}", path);
            }
        }

        Commands::Rm { path } => {
            let repo = Repo::discover(Path::new("."))?;
            let _lock = repo.lock()?;
            ops::rm(&repo, &path, true, false)?;
        }

        Commands::Add { path } => {
            let repo = Repo::discover(Path::new("."))?;
            let _lock = repo.lock()?;
            ops::add(&repo, &path)?;
        }

        Commands::Commit { message, author } => {
            let repo = Repo::discover(Path::new("."))?;
            let _lock = repo.lock()?;
            let signature = author.map(Signature::now);
            let hash = ops::commit(&repo, &message, signature)?;
            println!("{}", hash);
        }
    }

    Ok(())
}

fn print_changes(changes: &[ops::Change]) {
    for change in changes {
        let label = match change.kind {
            ops::ChangeKind::Added => "added:   ",
            ops::ChangeKind::Modified => "modified:",
            ops::ChangeKind::Deleted => "deleted: ",
        };
        println!("  {} {}", label, change.path);
    }
}
