//! Conversion of core errors into FUSE errno replies

use libc::c_int;

use common::counter_file::CounterFileError;
use common::mount::OpenError;

pub trait ToErrno {
    fn to_errno(&self) -> c_int;
}

impl ToErrno for CounterFileError {
    fn to_errno(&self) -> c_int {
        match self {
            CounterFileError::InvalidArgument(_) => libc::EINVAL,
            CounterFileError::Transfer(_) => libc::EFAULT,
            CounterFileError::IsADirectory => libc::EISDIR,
            CounterFileError::Unbound(_) => libc::EIO,
        }
    }
}

impl ToErrno for OpenError {
    fn to_errno(&self) -> c_int {
        match self {
            OpenError::NotFound(_) => libc::ENOENT,
            OpenError::CounterFile(e) => e.to_errno(),
        }
    }
}
