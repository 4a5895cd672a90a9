//! Symbol Resolver
//!
//! Wrapper around libloading that maps one shared library and resolves
//! its exports to raw addresses.

use std::ffi::{c_void, CString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::Library;
use tracing::{debug, warn};

use super::error::{FfiError, FfiResult};

/// Directories searched for bare library names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    paths: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// The working directory, the platform's library directories, then
    /// whatever the loader's own path variable lists
    pub fn system() -> Self {
        let mut search = Self::default();
        if let Ok(cwd) = std::env::current_dir() {
            search.push(cwd);
        }
        search.paths.extend(SYSTEM_LIBRARY_DIRS.iter().map(PathBuf::from));
        if let Some(value) = std::env::var_os(LOADER_PATH_VAR) {
            search.paths.extend(
                std::env::split_paths(&value).filter(|dir| !dir.as_os_str().is_empty()),
            );
        }
        search
    }

    pub fn push(&mut self, path: impl AsRef<Path>) {
        self.paths.push(path.as_ref().to_path_buf());
    }

    pub fn extend(&mut self, other: SearchPaths) {
        self.paths.extend(other.paths);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Find a library by path or by platform file name in the search paths
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.exists() {
            return Some(path.to_path_buf());
        }

        let file_name = library_filename(name);
        self.paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.exists())
    }
}

/// An opened shared library.
///
/// The mapping stays alive until [`SymbolResolver::close`] or drop, so
/// every address resolved through it stays valid as long as the resolver.
pub struct SymbolResolver {
    path: String,
    library: Option<Library>,
}

impl SymbolResolver {
    /// Map a library.
    ///
    /// An empty path opens the running process's own symbol table. Other
    /// names are tried as a file path, then against `search`, then handed
    /// to the OS loader unchanged.
    pub fn open(path: &str, search: &SearchPaths) -> FfiResult<Self> {
        if path.is_empty() {
            return Self::this_process();
        }

        let target = search
            .find(path)
            .unwrap_or_else(|| PathBuf::from(path));

        // Safety: mapping a library runs its initializers. The caller
        // names the library and vouches for it.
        let library = unsafe { Library::new(&target) }.map_err(|e| FfiError::LibraryLoad {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        debug!(library = path, resolved = %target.display(), "opened library");
        Ok(Self {
            path: path.to_string(),
            library: Some(library),
        })
    }

    /// Global symbols of the running process
    pub fn this_process() -> FfiResult<Self> {
        #[cfg(unix)]
        let library: Library = libloading::os::unix::Library::this().into();

        #[cfg(windows)]
        let library: Library = libloading::os::windows::Library::this()
            .map_err(|e| FfiError::LibraryLoad {
                path: String::new(),
                message: e.to_string(),
            })?
            .into();

        debug!("opened process symbol table");
        Ok(Self {
            path: String::new(),
            library: Some(library),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.library.is_some()
    }

    /// Resolve an exported function or variable to its address
    pub fn resolve(&self, symbol: &str) -> FfiResult<NonNull<c_void>> {
        let library = self.library.as_ref().ok_or_else(|| FfiError::LibraryLoad {
            path: self.path.clone(),
            message: "library already closed".to_string(),
        })?;
        let not_found = || FfiError::SymbolNotFound {
            symbol: symbol.to_string(),
        };
        let c_name = CString::new(symbol).map_err(|_| not_found())?;

        // Drop any error left pending by an earlier load or lookup.
        #[cfg(unix)]
        unsafe {
            libc::dlerror();
        }
        #[cfg(windows)]
        unsafe {
            windows_sys::Win32::Foundation::SetLastError(0);
        }

        // Safety: the address is only reinterpreted by the invocation,
        // using the types its caller declared.
        let address = unsafe {
            library
                .get::<*mut c_void>(c_name.as_bytes_with_nul())
                .map(|s| *s)
                .map_err(|e| {
                    debug!(library = %self.path, symbol, error = %e, "symbol lookup failed");
                    not_found()
                })?
        };

        let address = NonNull::new(address).ok_or_else(not_found)?;
        debug!(library = %self.path, symbol, address = ?address, "resolved symbol");
        Ok(address)
    }

    /// Unmap the library. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(library) = self.library.take() {
            match library.close() {
                Ok(()) => debug!(library = %self.path, "closed library"),
                Err(e) => warn!(library = %self.path, error = %e, "failed to close library"),
            }
        }
    }
}

impl Drop for SymbolResolver {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SymbolResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolResolver")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(target_os = "linux")]
const SYSTEM_LIBRARY_DIRS: &[&str] = &["/lib", "/lib64", "/usr/lib", "/usr/lib64", "/usr/local/lib"];
#[cfg(target_os = "macos")]
const SYSTEM_LIBRARY_DIRS: &[&str] = &["/usr/lib", "/usr/local/lib", "/opt/homebrew/lib"];
#[cfg(windows)]
const SYSTEM_LIBRARY_DIRS: &[&str] = &["C:\\Windows\\System32"];
#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
const SYSTEM_LIBRARY_DIRS: &[&str] = &["/usr/lib", "/usr/local/lib"];

/// Environment variable the OS loader itself consults
#[cfg(target_os = "macos")]
const LOADER_PATH_VAR: &str = "DYLD_LIBRARY_PATH";
#[cfg(windows)]
const LOADER_PATH_VAR: &str = "PATH";
#[cfg(not(any(target_os = "macos", windows)))]
const LOADER_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// (prefix, suffix) of a shared library file name
#[cfg(target_os = "macos")]
const LIBRARY_AFFIXES: (&str, &str) = ("lib", ".dylib");
#[cfg(windows)]
const LIBRARY_AFFIXES: (&str, &str) = ("", ".dll");
#[cfg(not(any(target_os = "macos", windows)))]
const LIBRARY_AFFIXES: (&str, &str) = ("lib", ".so");

/// Platform file name for a bare library name.
///
/// Names that already carry the prefix and suffix, including versioned
/// ones like `libm.so.6`, come back unchanged.
pub fn library_filename(name: &str) -> String {
    let (prefix, suffix) = LIBRARY_AFFIXES;
    let lower = name.to_ascii_lowercase();
    let versioned = format!("{suffix}.");
    if name.starts_with(prefix) && (lower.ends_with(suffix) || lower.contains(&versioned)) {
        name.to_string()
    } else {
        format!("{prefix}{name}{suffix}")
    }
}
