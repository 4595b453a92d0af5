mod args;

use std::{
    io::{self, Write},
    time::SystemTime,
};

use args::{ClientArgs, Command};
use clap::Parser;
use futures::{pin_mut, TryStreamExt};
use hfs::{
    fs::{self, RemoteFile, RemoteOpenOptions},
    local::LocalFs,
    Endpoint, FileStat, OpenMode, RemoteClient,
};

#[tokio::main]
async fn main() -> io::Result<()> {
    match std::env::var("RUST_LOG") {
        Ok(_) => (),
        Err(_) => std::env::set_var("RUST_LOG", "INFO"),
    }

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&std::env::var("RUST_LOG").expect("RUST_LOG environment variable not set"))
        .init();

    let args = ClientArgs::parse();
    let client = LocalFs::new(&args.root);
    let endpoint = args.endpoint;

    log::debug!("remote namespace rooted at {:?}", client.base());

    let mut out = io::stdout().lock();

    match run(client, endpoint, args.chunk_len, args.command, &mut out).await {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("{}", e);
            Err(e)
        }
    }
}

/// Execute a single command, writing its output to `out`.
async fn run<C, W>(
    client: C,
    endpoint: Endpoint,
    chunk_len: usize,
    command: Command,
    out: &mut W,
) -> io::Result<()>
where
    C: RemoteClient,
    W: Write,
{
    match command {
        Command::Cat { path } => {
            let contents = fs::read(client, endpoint, &path).await?;
            out.write_all(&contents)?;
        }

        Command::Lines { path, number } => {
            let mut file = RemoteFile::open(client, endpoint, &path).await?;
            let res = print_lines(&mut file, chunk_len, number, out).await;
            file.close().await?;
            res?;
        }

        Command::Put {
            local,
            remote,
            replication,
            block_size,
        } => {
            let contents = tokio::fs::read(&local).await?;

            let mut file = RemoteOpenOptions::new()
                .mode(OpenMode::Write)
                .replication(replication)
                .block_size(block_size)
                .open(client, endpoint, &remote)
                .await?;
            let written = file.write(&contents).await;
            file.close().await?;
            let written = written?;

            if written < contents.len() {
                log::warn!("short write to <{}>: {} of {} bytes", remote, written, contents.len());
            }
            writeln!(out, "{} bytes written to {}", written, remote)?;
        }

        Command::Stat { path } => match fs::stat(client, endpoint, &path).await? {
            Some(st) => write_stat(&st, out)?,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("<{}> does not exist", path),
                ))
            }
        },

        Command::Exists { path } => {
            let exists = fs::exists(client, endpoint, &path).await?;
            writeln!(out, "{}", exists)?;
        }
    }

    out.flush()
}

async fn print_lines<C, W>(
    file: &mut RemoteFile<C>,
    chunk_len: usize,
    number: bool,
    out: &mut W,
) -> io::Result<()>
where
    C: RemoteClient,
    W: Write,
{
    let lines = file.lines_with(chunk_len);
    pin_mut!(lines);

    let mut line_num = 0;
    while let Some(line) = lines.try_next().await.map_err(io::Error::from)? {
        line_num += 1;

        if number {
            write!(out, "{:>6}\t", line_num)?;
        }
        out.write_all(&line)?;
    }

    Ok(())
}

fn write_stat<W: Write>(st: &FileStat, out: &mut W) -> io::Result<()> {
    let time = |t: SystemTime| humantime::format_rfc3339_seconds(t).to_string();

    writeln!(out, "  Name: {}", st.name)?;
    writeln!(out, "  Kind: {:?}", st.kind)?;
    writeln!(out, "  Size: {}", st.size)?;
    writeln!(out, "Blocks: {} bytes x{} replicas", st.block_size, st.replication)?;
    writeln!(out, "Access: {} {}:{}", st.permissions, st.owner, st.group)?;
    writeln!(out, "Modify: {}", time(st.last_modified))?;
    writeln!(out, "  Read: {}", time(st.last_access))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("local", 0)
    }

    #[tokio::test]
    async fn test_put_then_lines() {
        let dir = tempfile::tempdir().unwrap();
        let local_file = dir.path().join("local.txt");
        std::fs::write(&local_file, "alpha\nbeta\n").unwrap();

        let remote_root = dir.path().join("remote");
        std::fs::create_dir(&remote_root).unwrap();
        let client = LocalFs::new(&remote_root);

        let mut out = Vec::new();
        let put = Command::Put {
            local: local_file,
            remote: "/copy.txt".to_owned(),
            replication: 0,
            block_size: 0,
        };
        run(client.clone(), endpoint(), 4, put, &mut out).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out), "11 bytes written to /copy.txt\n");

        let mut out = Vec::new();
        let lines = Command::Lines {
            path: "/copy.txt".to_owned(),
            number: true,
        };
        run(client.clone(), endpoint(), 4, lines, &mut out).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out), "     1\talpha\n     2\tbeta\n");

        let mut out = Vec::new();
        let cat = Command::Cat {
            path: "/copy.txt".to_owned(),
        };
        run(client, endpoint(), 4, cat, &mut out).await.unwrap();
        assert_eq!(out, b"alpha\nbeta\n");
    }

    #[tokio::test]
    async fn test_stat_missing() {
        let dir = tempfile::tempdir().unwrap();
        let client = LocalFs::new(dir.path());

        let mut out = Vec::new();
        let err = run(
            client.clone(),
            endpoint(),
            4,
            Command::Stat {
                path: "/nope".to_owned(),
            },
            &mut out,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        run(
            client,
            endpoint(),
            4,
            Command::Exists {
                path: "/nope".to_owned(),
            },
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(out, b"false\n");
    }

    #[test]
    fn test_write_stat() {
        let st = FileStat {
            kind: hfs::ObjectKind::File,
            name: "/a".to_owned(),
            size: 3,
            last_modified: SystemTime::UNIX_EPOCH,
            last_access: SystemTime::UNIX_EPOCH,
            replication: 3,
            block_size: 1024,
            owner: "hfs".to_owned(),
            group: "supergroup".to_owned(),
            permissions: hfs::Permissions::from_mode(0o644),
        };

        let mut out = Vec::new();
        write_stat(&st, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Size: 3"));
        assert!(text.contains("rw-r--r-- hfs:supergroup"));
        assert!(text.contains("Modify: 1970-01-01T00:00:00Z"));
    }
}
