//! Exclusive ownership of a cache directory.
//!
//! The file store keeps an in-process key index, so one process writes a
//! cache directory at a time. Ownership is an OS lock on `<dir>/.lock`; the
//! file body records the owning pid so a refused open can name the holder.
//! A pid left behind by a crashed owner is not a lock: the OS lock died with
//! the process, and the next open reclaims the directory.

use std::fs::{self, File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".lock";

/// Held ownership of a cache directory. Released on drop.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
    reclaimed_from: Option<u32>,
}

impl FileLock {
    /// Takes ownership of `dir` without blocking and records this process
    /// as the holder.
    ///
    /// # Errors
    /// - `ErrorKind::WouldBlock` naming the holding pid when the directory
    ///   is owned by a live process
    /// - any I/O error opening or writing the lock file
    pub fn acquire(dir: &Path) -> IoResult<Self> {
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if !os::lock_exclusive(&file)? {
            let holder = read_pid(&mut file)
                .ok()
                .flatten()
                .map_or_else(|| "an unknown process".to_string(), |pid| format!("pid {pid}"));
            return Err(IoError::new(
                ErrorKind::WouldBlock,
                format!("cache directory {} is held by {holder}", dir.display()),
            ));
        }

        let previous = read_pid(&mut file)?;
        let own = std::process::id();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{own}")?;
        file.flush()?;

        Ok(Self {
            _file: file,
            path,
            reclaimed_from: previous.filter(|&pid| pid != own),
        })
    }

    /// Pid recorded in `dir`'s lock file, whether or not it is still held.
    ///
    /// # Errors
    /// Fails when the lock file exists but cannot be read.
    pub fn recorded_holder(dir: &Path) -> IoResult<Option<u32>> {
        match fs::read_to_string(dir.join(LOCK_FILE)) {
            Ok(body) => Ok(body.trim().parse().ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Pid of an earlier owner that exited without releasing the directory.
    #[must_use]
    pub fn reclaimed_from(&self) -> Option<u32> {
        self.reclaimed_from
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_pid(file: &mut File) -> IoResult<Option<u32>> {
    let mut body = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut body)?;
    Ok(body.trim().parse().ok())
}

/// Non-blocking exclusive lock. `Ok(false)` means another owner holds it.
#[cfg(unix)]
mod os {
    use std::fs::File;
    use std::io::{Error as IoError, Result as IoResult};
    use std::os::unix::io::AsRawFd;

    pub(super) fn lock_exclusive(file: &File) -> IoResult<bool> {
        // SAFETY: the descriptor is owned by `file` for the whole call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc == 0 {
            return Ok(true);
        }
        let err = IoError::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Ok(false)
        } else {
            Err(err)
        }
    }
}

#[cfg(windows)]
mod os {
    use std::fs::File;
    use std::io::{Error as IoError, Result as IoResult};
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    // Locks a byte range past the pid so the body stays readable to others.
    const LOCK_OFFSET: u32 = 64;

    pub(super) fn lock_exclusive(file: &File) -> IoResult<bool> {
        // SAFETY: the handle is owned by `file`; OVERLAPPED is plain data.
        let ok = unsafe {
            let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
            overlapped.Anonymous.Anonymous.Offset = LOCK_OFFSET;
            LockFileEx(
                file.as_raw_handle() as HANDLE,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                1,
                0,
                &mut overlapped,
            )
        };
        if ok != 0 {
            return Ok(true);
        }
        let err = IoError::last_os_error();
        if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
            Ok(false)
        } else {
            Err(err)
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod os {
    use std::fs::File;
    use std::io::{Error as IoError, ErrorKind, Result as IoResult};

    pub(super) fn lock_exclusive(_file: &File) -> IoResult<bool> {
        Err(IoError::new(
            ErrorKind::Unsupported,
            "cache directory locking is not supported on this platform",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_holder_pid_is_recorded() {
        let dir = tempdir().unwrap();
        let lock = FileLock::acquire(dir.path()).unwrap();
        assert!(lock.path().ends_with(LOCK_FILE));
        assert_eq!(
            FileLock::recorded_holder(dir.path()).unwrap(),
            Some(std::process::id())
        );
        assert_eq!(lock.reclaimed_from(), None);
    }

    #[test]
    fn test_contended_open_names_holder() {
        let dir = tempdir().unwrap();
        let _held = FileLock::acquire(dir.path()).unwrap();

        let err = FileLock::acquire(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
        assert!(
            err.to_string().contains(&format!("pid {}", std::process::id())),
            "{err}"
        );
    }

    #[test]
    fn test_stale_pid_is_reclaimed() {
        let dir = tempdir().unwrap();
        // A crashed owner leaves its pid behind but no OS lock.
        fs::write(dir.path().join(LOCK_FILE), "4294967\n").unwrap();

        let lock = FileLock::acquire(dir.path()).unwrap();
        assert_eq!(lock.reclaimed_from(), Some(4_294_967));
        assert_eq!(
            FileLock::recorded_holder(dir.path()).unwrap(),
            Some(std::process::id())
        );
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempdir().unwrap();
        drop(FileLock::acquire(dir.path()).unwrap());
        let again = FileLock::acquire(dir.path()).unwrap();
        // Our own pid from the first owner is not reported as reclaimed.
        assert_eq!(again.reclaimed_from(), None);
    }

    #[test]
    fn test_missing_lock_file_has_no_holder() {
        let dir = tempdir().unwrap();
        assert_eq!(FileLock::recorded_holder(dir.path()).unwrap(), None);
    }
}
