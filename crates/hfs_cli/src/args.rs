//! Command-line args for client

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hfs::{
    defaults::{DEFAULT_CHUNK_LEN, DEFAULT_HOST, DEFAULT_PORT},
    Endpoint,
};

/// Read and write files on a remote store
#[derive(Parser)]
pub struct ClientArgs {
    /// Local directory standing in for the remote namespace.
    #[clap(short, long)]
    #[clap(default_value = std::env::current_dir().unwrap_or_default().into_os_string())]
    pub root: PathBuf,

    /// The remote to connect to, as `host:port`. A bare host uses port 0.
    #[clap(short, long)]
    #[clap(default_value_t = Endpoint::new(DEFAULT_HOST, DEFAULT_PORT))]
    pub endpoint: Endpoint,

    /// Number of bytes fetched per round trip when reading lines.
    #[clap(short, long)]
    #[clap(default_value_t = DEFAULT_CHUNK_LEN)]
    pub chunk_len: usize,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the contents of a remote file.
    Cat { path: String },

    /// Print a remote file line by line.
    Lines {
        path: String,

        /// Prefix every line with its number.
        #[clap(short, long)]
        number: bool,
    },

    /// Copy a local file to the remote.
    Put {
        local: PathBuf,
        remote: String,

        /// Block replication of the remote file.
        #[clap(long)]
        #[clap(default_value_t = 0)]
        replication: u16,

        /// Block size of the remote file.
        #[clap(long)]
        #[clap(default_value_t = 0)]
        block_size: u64,
    },

    /// Show metadata of a remote path.
    Stat { path: String },

    /// Check if a remote path exists.
    Exists { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let args = ClientArgs::parse_from(["hfs", "cat", "/user/data.txt"]);

        assert_eq!(args.endpoint, Endpoint::new(DEFAULT_HOST, DEFAULT_PORT));
        assert_eq!(args.chunk_len, DEFAULT_CHUNK_LEN);
        assert!(matches!(args.command, Command::Cat { path } if path == "/user/data.txt"));
    }

    #[test]
    fn test_parse_put() {
        let args = ClientArgs::parse_from([
            "hfs",
            "--root",
            "/srv/hfs",
            "-e",
            "namenode:9000",
            "put",
            "local.txt",
            "/remote.txt",
            "--replication",
            "2",
        ]);

        assert_eq!(args.root, PathBuf::from("/srv/hfs"));
        assert_eq!(args.endpoint, Endpoint::new("namenode", 9000));
        assert!(matches!(
            args.command,
            Command::Put {
                replication: 2,
                block_size: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_endpoint() {
        let args = ClientArgs::parse_from(["hfs", "--endpoint", "localhost", "exists", "/a"]);
        assert_eq!(args.endpoint, Endpoint::new("localhost", 0));

        let res = ClientArgs::try_parse_from(["hfs", "-e", "host:notaport", "exists", "/a"]);
        assert!(res.is_err());
    }
}
