use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};

/// name of the repository data directory inside the worktree
pub const DATA_DIR: &str = ".twig";

/// a twig repository: a worktree plus its data directory
pub struct Repo {
    worktree: PathBuf,
    gitdir: PathBuf,
    config: Config,
}

impl Repo {
    /// initialize a new repository at the given worktree path
    pub fn init(path: &Path) -> Result<Self> {
        let worktree = absolutize(path)?;
        let gitdir = worktree.join(DATA_DIR);

        if gitdir.exists() {
            let mut entries = fs::read_dir(&gitdir).with_path(&gitdir)?;
            if entries.next().is_some() {
                return Err(Error::RepoExists(worktree));
            }
        }

        fs::create_dir_all(gitdir.join("objects")).with_path(&gitdir)?;
        fs::create_dir_all(gitdir.join("refs/heads")).with_path(&gitdir)?;
        fs::create_dir_all(gitdir.join("refs/tags")).with_path(&gitdir)?;
        fs::create_dir_all(gitdir.join("refs/remotes")).with_path(&gitdir)?;
        fs::create_dir_all(gitdir.join("info")).with_path(&gitdir)?;

        let description = gitdir.join("description");
        fs::write(
            &description,
            "Unnamed repository; edit this file 'description' to name the repository.\n",
        )
        .with_path(&description)?;

        let head = gitdir.join("HEAD");
        fs::write(&head, "ref: refs/heads/master\n").with_path(&head)?;

        let config = Config::default();
        config.save(&gitdir.join("config.toml"))?;

        Ok(Self {
            worktree,
            gitdir,
            config,
        })
    }

    /// open an existing repository rooted at the given worktree path
    pub fn open(path: &Path) -> Result<Self> {
        let worktree = absolutize(path)?;
        let gitdir = worktree.join(DATA_DIR);
        let config_path = gitdir.join("config.toml");

        if !config_path.exists() {
            return Err(Error::NoRepo(worktree));
        }

        let config = Config::load(&config_path)?;

        Ok(Self {
            worktree,
            gitdir,
            config,
        })
    }

    /// search upward from the given path for a repository
    ///
    /// lets commands run from any subdirectory of the worktree.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = absolutize(start)?;
        let mut current = start.clone();
        loop {
            if current.join(DATA_DIR).is_dir() {
                return Self::open(&current);
            }
            if !current.pop() {
                return Err(Error::NoRepo(start));
            }
        }
    }

    /// worktree root path
    pub fn worktree(&self) -> &Path {
        &self.worktree
    }

    /// data directory path
    pub fn gitdir(&self) -> &Path {
        &self.gitdir
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// mutable access to configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// save configuration changes
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.gitdir.join("config.toml"))
    }

    /// compute a path under the data directory
    ///
    /// rejects absolute input and any `.`/`..` component so a crafted ref
    /// name can never escape the data directory.
    pub fn gitdir_path(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        for component in rel_path.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(Error::PathTraversal(self.gitdir.join(rel))),
            }
        }
        Ok(self.gitdir.join(rel_path))
    }

    /// path to the staging index file
    pub fn index_path(&self) -> PathBuf {
        self.gitdir.join("index")
    }

    /// path to the objects directory
    pub fn objects_path(&self) -> PathBuf {
        self.gitdir.join("objects")
    }

    /// path to lock file
    pub fn lock_path(&self) -> PathBuf {
        self.gitdir.join(".lock")
    }

    /// acquire exclusive advisory lock on the repository
    /// returns a guard that releases the lock on drop
    pub fn lock(&self) -> Result<RepoLock> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock =
            Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|_| Error::LockContention)?;

        Ok(RepoLock { flock })
    }

    /// try to acquire the lock, returning None if already held
    pub fn try_lock(&self) -> Result<Option<RepoLock>> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => Ok(Some(RepoLock { flock })),
            Err((_, nix::errno::Errno::EWOULDBLOCK)) => Ok(None),
            Err(_) => Err(Error::LockContention),
        }
    }
}

/// guard that holds the repository lock until dropped
pub struct RepoLock {
    #[allow(dead_code)]
    flock: Flock<File>,
}
// lock is released automatically when Flock is dropped

/// removes the temp file on drop unless the rename succeeded
struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// atomically replace `path` with `bytes`
///
/// writes a temp file in the same directory, fsyncs it, renames it into
/// place, then fsyncs the directory. the temp file is removed on every
/// failure path, so a reader can never observe a partial write.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| Error::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent"),
    })?;

    let tmp_path = dir.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
    let mut guard = TempGuard {
        path: tmp_path.clone(),
        armed: true,
    };

    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(bytes).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    fs::rename(&tmp_path, path).with_path(path)?;
    guard.armed = false;

    let dir_file = File::open(dir).with_path(dir)?;
    dir_file.sync_all().with_path(dir)?;

    Ok(())
}

/// make a path absolute against the current directory and fold `.`/`..`
pub(crate) fn absolutize(path: &Path) -> Result<PathBuf> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().with_path(path)?;
        cwd.join(path)
    };
    Ok(normalize_path(&abs))
}

/// lexically fold `.` and `..` components without touching the filesystem
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
