//! legacy exit status codes for system programs.
//! reference: [SYSEXITS](https://man.freebsd.org/cgi/man.cgi?query=sysexits&apropos=0&sektion=0&manpath=FreeBSD+11.2-stable&arch=default&format=html)

/// value: 64 <br>
/// The command was used incorrectly, e.g., with the wrong number of arguments.
pub const EX_USAGE: i32 = 64;

/// value: 65 <br>
/// The input data was incorrect in some way, e.g. an archive without the
/// metadata needed to restore from it.
pub const EX_DATAERR: i32 = 65;

/// value: 66 <br>
/// An input file did not exist or was not readable.
pub const EX_NOINPUT: i32 = 66;

/// value: 70 <br>
/// An internal software error has been detected.
pub const EX_SOFTWARE: i32 = 70;

/// value: 74 <br>
/// An error occurred while doing I/O on some file.
pub const EX_IOERR: i32 = 74;

/// value: 78 <br>
/// Something was found in an unconfigured or misconfigured state.
pub const EX_CONFIG: i32 = 78;
