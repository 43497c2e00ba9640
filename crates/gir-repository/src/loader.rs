//! Native symbol loading
//!
//! The invoker never opens libraries itself; it asks a [`SymbolLoader`] for
//! the address of a function's symbol. [`Library`] and [`LibrarySet`] back
//! that with the namespace's shared libraries, [`SymbolTable`] with an
//! explicit map.

use rustc_hash::FxHashMap;
use std::ffi::{c_void, CStr, CString};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Errors from opening libraries and resolving symbols
#[derive(Debug, Error)]
pub enum LoadError {
    /// The dynamic loader refused the library
    #[error("Library not found: {path}")]
    NotFound {
        /// Library name plus the loader's message
        path: String,
    },

    #[error("Symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        symbol: String,
        /// Where it was looked up
        library: String,
    },

    /// Name with an interior NUL, or a failing OS call
    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Invalid UTF-8 in path: {0}")]
    InvalidPath(String),
}

/// Maps an exported name to a callable address
pub trait SymbolLoader {
    /// Address of `symbol`
    fn symbol(&self, symbol: &str) -> Result<*const c_void, LoadError>;
}

/// One opened shared library
pub struct Library {
    handle: NativeHandle,
    path: String,
}

impl Library {
    /// Open the shared library named by a typelib, e.g. `libgobject-2.0.so.0`
    ///
    /// Names without a directory are found through the loader's search path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let name = path
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path)))?;
        Ok(Library {
            handle: NativeHandle::load(Some(name))?,
            path: name.to_string(),
        })
    }

    /// Handle onto the running executable and everything it has loaded
    pub fn this_process() -> Result<Self, LoadError> {
        Ok(Library {
            handle: NativeHandle::load(None)?,
            path: "<process>".to_string(),
        })
    }

    /// Name the library was opened with
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl SymbolLoader for Library {
    fn symbol(&self, symbol: &str) -> Result<*const c_void, LoadError> {
        self.handle.symbol(symbol, &self.path)
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

/// Shared libraries of one namespace, searched in order for each symbol
#[derive(Debug)]
pub struct LibrarySet {
    libraries: Vec<Library>,
}

impl LibrarySet {
    /// Open every library in `paths`
    ///
    /// Libraries that fail to open are skipped with a warning; the set fails
    /// only when none of them opens.
    pub fn open<I, P>(paths: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut libraries = Vec::new();
        let mut last_error = None;
        for path in paths {
            match Library::open(path.as_ref()) {
                Ok(library) => libraries.push(library),
                Err(error) => {
                    warn!(path = %path.as_ref().display(), %error, "Failed to open shared library");
                    last_error = Some(error);
                }
            }
        }
        if libraries.is_empty() {
            return Err(last_error.unwrap_or_else(|| LoadError::NotFound {
                path: String::new(),
            }));
        }
        Ok(LibrarySet { libraries })
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }
}

impl SymbolLoader for LibrarySet {
    fn symbol(&self, symbol: &str) -> Result<*const c_void, LoadError> {
        self.libraries
            .iter()
            .find_map(|library| library.symbol(symbol).ok())
            .ok_or_else(|| LoadError::SymbolNotFound {
                symbol: symbol.to_string(),
                library: self
                    .libraries
                    .iter()
                    .map(Library::path)
                    .collect::<Vec<_>>()
                    .join(","),
            })
    }
}

/// Explicit name -> address map
///
/// Lets callers expose functions that were never exported from a shared
/// library, such as `extern "C"` functions of the current crate.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: FxHashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `address` under `name`, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, address: *const c_void) -> &mut Self {
        self.symbols.insert(name.into(), address as usize);
        self
    }

    pub fn get(&self, name: &str) -> Option<*const c_void> {
        self.symbols.get(name).map(|&address| address as *const c_void)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolLoader for SymbolTable {
    fn symbol(&self, symbol: &str) -> Result<*const c_void, LoadError> {
        self.get(symbol).ok_or_else(|| LoadError::SymbolNotFound {
            symbol: symbol.to_string(),
            library: "<symbol table>".to_string(),
        })
    }
}

fn symbol_name(name: &str) -> Result<CString, LoadError> {
    CString::new(name).map_err(|e| LoadError::PlatformError(format!("Invalid symbol name: {}", e)))
}

/// `dlopen` handle; `None` opens the running process
#[cfg(unix)]
struct NativeHandle(*mut c_void);

#[cfg(unix)]
fn dl_error() -> Option<String> {
    let message = unsafe { libc::dlerror() };
    (!message.is_null())
        .then(|| unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned())
}

#[cfg(unix)]
impl NativeHandle {
    fn load(name: Option<&str>) -> Result<Self, LoadError> {
        let c_name = name
            .map(CString::new)
            .transpose()
            .map_err(|e| LoadError::PlatformError(format!("Invalid path: {}", e)))?;
        let handle = unsafe {
            libc::dlopen(
                c_name.as_ref().map_or(std::ptr::null(), |n| n.as_ptr()),
                libc::RTLD_NOW | libc::RTLD_LOCAL,
            )
        };
        if handle.is_null() {
            let error = dl_error().unwrap_or_else(|| "Unknown error".to_string());
            return Err(LoadError::NotFound {
                path: format!("{}: {}", name.unwrap_or("<process>"), error),
            });
        }
        Ok(NativeHandle(handle))
    }

    fn symbol(&self, name: &str, library: &str) -> Result<*const c_void, LoadError> {
        let c_name = symbol_name(name)?;
        // A NULL symbol is legal; only dlerror says whether the lookup failed
        dl_error();
        let address = unsafe { libc::dlsym(self.0, c_name.as_ptr()) };
        let library = match dl_error() {
            Some(error) => format!("{}: {}", library, error),
            None if address.is_null() => library.to_string(),
            None => return Ok(address.cast_const()),
        };
        Err(LoadError::SymbolNotFound {
            symbol: name.to_string(),
            library,
        })
    }
}

#[cfg(unix)]
impl Drop for NativeHandle {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.0);
        }
    }
}

// Handles are only read after load
#[cfg(unix)]
unsafe impl Send for NativeHandle {}
#[cfg(unix)]
unsafe impl Sync for NativeHandle {}

/// Module handle; only handles from `LoadLibraryW` are freed
#[cfg(windows)]
struct NativeHandle {
    handle: *mut c_void,
    owned: bool,
}

#[cfg(windows)]
impl NativeHandle {
    fn load(path: Option<&str>) -> Result<Self, LoadError> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;

        let Some(path) = path else {
            let handle = unsafe { GetModuleHandleW(std::ptr::null()) };
            if handle.is_null() {
                let error = unsafe { GetLastError() };
                return Err(LoadError::PlatformError(format!(
                    "GetModuleHandleW failed (error code: {})",
                    error
                )));
            }
            return Ok(NativeHandle {
                handle,
                owned: false,
            });
        };

        let wide: Vec<u16> = OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };

        if handle.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::NotFound {
                path: format!("{} (error code: {})", path, error),
            });
        }

        Ok(NativeHandle {
            handle,
            owned: true,
        })
    }

    fn symbol(&self, name: &str, library: &str) -> Result<*const c_void, LoadError> {
        let c_name = symbol_name(name)?;
        let address = unsafe { GetProcAddress(self.handle, c_name.as_ptr()) };
        if address.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{} (error code: {})", library, error),
            });
        }
        Ok(address.cast_const())
    }
}

#[cfg(windows)]
impl Drop for NativeHandle {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                FreeLibrary(self.handle);
            }
        }
    }
}

#[cfg(windows)]
unsafe impl Send for NativeHandle {}
#[cfg(windows)]
unsafe impl Sync for NativeHandle {}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut c_void;
    fn GetModuleHandleW(filename: *const u16) -> *mut c_void;
    fn GetProcAddress(module: *mut c_void, procname: *const i8) -> *mut c_void;
    fn FreeLibrary(module: *mut c_void) -> i32;
    fn GetLastError() -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn forty_two() -> i32 {
        42
    }

    #[test]
    fn test_library_not_found() {
        let result = Library::open("/nonexistent/library.so");
        match result {
            Err(LoadError::NotFound { path }) => assert!(path.contains("/nonexistent/library.so")),
            other => panic!("Expected NotFound error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_this_process_resolves_libc() {
        let lib = Library::this_process().unwrap();
        assert!(!lib.symbol("strlen").unwrap().is_null());
        assert!(matches!(
            lib.symbol("gir_no_such_symbol_anywhere"),
            Err(LoadError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn test_library_set_needs_one_library() {
        let result = LibrarySet::open(["/nonexistent/a.so", "/nonexistent/b.so"]);
        match result {
            Err(LoadError::NotFound { path }) => assert!(path.contains("b.so")),
            other => panic!("Expected NotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_symbol_table() {
        let mut table = SymbolTable::new();
        assert!(table.is_empty());
        table.register("forty_two", forty_two as *const c_void);
        assert_eq!(table.len(), 1);
        assert!(table.contains("forty_two"));

        let address = table.symbol("forty_two").unwrap();
        let f: extern "C" fn() -> i32 = unsafe { std::mem::transmute(address) };
        assert_eq!(f(), 42);

        match table.symbol("missing") {
            Err(LoadError::SymbolNotFound { symbol, .. }) => assert_eq!(symbol, "missing"),
            other => panic!("Expected SymbolNotFound, got {:?}", other),
        }
    }
}
