use serde::Serialize;

pub const RETURN_CODE_OK: i32 = 0;
pub const RETURN_CODE_WARNING: i32 = 1;
pub const RETURN_CODE_ERROR: i32 = 2;
pub const RETURN_CODE_FATAL: i32 = 3;
pub const RETURN_CODE_CMDLINE: i32 = 4;

/// With more warnings than this the run counts as failed.
pub const MAX_WARNINGS: u32 = 500;

/// Counters written to the output metadata.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Stats {
    pub ways: u32,
    pub unconnected_nodes: u32,
    pub rings: u32,
    pub rings_from_single_way: u32,
    pub rings_fixed: u32,
    pub rings_turned_around: u32,
    pub land_polygons_before_split: u32,
    pub land_polygons_after_split: u32,
}

/// Warning and error tally of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    pub warnings: u32,
    pub errors: u32,
}

impl RunStatus {
    pub fn warn(&mut self, count: u32) {
        self.warnings += count;
    }

    pub fn error(&mut self, count: u32) {
        self.errors += count;
    }

    pub fn exit_code(&self) -> i32 {
        if self.errors > 0 || self.warnings > MAX_WARNINGS {
            RETURN_CODE_ERROR
        } else if self.warnings > 0 {
            RETURN_CODE_WARNING
        } else {
            RETURN_CODE_OK
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_taxonomy() {
        assert_eq!(RunStatus::default().exit_code(), RETURN_CODE_OK);

        let mut status = RunStatus::default();
        status.warn(3);
        assert_eq!(status.exit_code(), RETURN_CODE_WARNING);

        status.warn(MAX_WARNINGS);
        assert_eq!(status.exit_code(), RETURN_CODE_ERROR);

        let mut status = RunStatus::default();
        status.error(1);
        assert_eq!(status.exit_code(), RETURN_CODE_ERROR);
    }
}
