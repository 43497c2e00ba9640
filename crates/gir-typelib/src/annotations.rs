//! Annotation table lookup
//!
//! The annotation table is sorted by owner offset, descending. Records that
//! share an owner are contiguous but not sorted by key, so a lookup first
//! binary-searches for any record of the owner, walks back to the first one,
//! and then scans the run.

use crate::blob::annotation;
use crate::reader::{element_offset, ReadError};
use crate::Typelib;
use std::ops::Range;

/// One key/value annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotation<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl Typelib {
    fn annotation_record(&self, index: u32) -> Result<u32, ReadError> {
        let header = self.header();
        element_offset(
            header.annotations,
            index,
            u32::from(header.sizes.annotation),
        )
    }

    fn annotation_owner(&self, index: u32) -> Result<u32, ReadError> {
        self.u32_field(self.annotation_record(index)?, annotation::OWNER)
    }

    /// Index range of the records owned by `owner`
    fn annotation_run(&self, owner: u32) -> Result<Option<Range<u32>>, ReadError> {
        let n = self.header().n_annotations;
        let (mut lo, mut hi) = (0u32, n);
        let mut hit = None;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let found = self.annotation_owner(mid)?;
            if found == owner {
                hit = Some(mid);
                break;
            } else if found > owner {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let Some(mut start) = hit else {
            return Ok(None);
        };
        while start > 0 && self.annotation_owner(start - 1)? == owner {
            start -= 1;
        }
        let mut end = start + 1;
        while end < n && self.annotation_owner(end)? == owner {
            end += 1;
        }
        Ok(Some(start..end))
    }

    /// Value of annotation `key` on the blob at `owner`
    pub fn annotation(&self, owner: u32, key: &str) -> Result<Option<&str>, ReadError> {
        let Some(run) = self.annotation_run(owner)? else {
            return Ok(None);
        };
        for index in run {
            let record = self.annotation_record(index)?;
            if self.string(self.u32_field(record, annotation::NAME)?)? == key {
                return self
                    .string(self.u32_field(record, annotation::VALUE)?)
                    .map(Some);
            }
        }
        Ok(None)
    }

    /// All annotations on the blob at `owner`, in table order
    pub fn annotations_for(&self, owner: u32) -> Result<Vec<Annotation<'_>>, ReadError> {
        let Some(run) = self.annotation_run(owner)? else {
            return Ok(Vec::new());
        };
        run.map(|index| {
            let record = self.annotation_record(index)?;
            Ok(Annotation {
                key: self.string(self.u32_field(record, annotation::NAME)?)?,
                value: self.string(self.u32_field(record, annotation::VALUE)?)?,
            })
        })
        .collect()
    }
}
