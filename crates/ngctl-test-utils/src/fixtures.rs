//! Canned daemon payloads.

/// Header line of every `STATS` reply.
pub const STATS_HEADER: &str = "SourceName;SourceId;SourceInstance;State;Type;Number";

/// A well-formed `STATS` reply with five rows covering every state.
pub const SAMPLE_STATS: &str = "SourceName;SourceId;SourceInstance;State;Type;Number\n\
center;;received;a;processed;1532\n\
src.internal;s_local#0;;a;processed;42\n\
src.internal;s_local#0;;a;stamp;1700000000\n\
dst.file;d_messages#0;/var/log/messages;o;dropped;7\n\
dst.network;d_remote#1;tcp,10.0.0.5:514;d;queued;3\n";

/// Number of data rows in [`SAMPLE_STATS`].
pub const SAMPLE_STATS_ROWS: usize = 5;

/// Build a `STATS` reply from data rows, header included.
pub fn stats_reply(rows: &[&str]) -> String {
    let mut out = String::from(STATS_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out
}
