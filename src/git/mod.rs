mod diff;
mod status;

pub use diff::{
    parse_diff, parse_hunk_header, FileMarker, HunkMarker, LineContext, LineInfo, ParsedDiff,
};
pub use status::FileStatus;
