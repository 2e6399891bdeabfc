//! Table descriptors
//!
//! A descriptor classifies one table for the chunk planner. The closed
//! set of shapes is modeled as a tagged enum; director references inside
//! child and match descriptors share the pooled director allocation, so
//! holding any descriptor keeps its directors alive.

use std::fmt;
use std::sync::Arc;

/// A partitioned table whose primary key defines the partitioning of
/// every table referencing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorInfo {
    pub db: String,
    pub name: String,
    /// Primary-key column
    pub pk: String,
    /// Longitude column
    pub lon: String,
    /// Latitude column
    pub lat: String,
    /// Partitioning scheme of the owning database
    pub partitioning_id: u32,
}

/// A partitioned table referencing exactly one director.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildInfo {
    pub db: String,
    pub name: String,
    pub director: Arc<DirectorInfo>,
    /// Foreign-key column referencing the director's primary key
    pub fk: String,
}

/// A partitioned table relating two directors with the same
/// partitioning id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInfo {
    pub db: String,
    pub name: String,
    pub first: Arc<DirectorInfo>,
    pub second: Arc<DirectorInfo>,
    /// Foreign-key column referencing `first`
    pub first_fk: String,
    /// Foreign-key column referencing `second`
    pub second_fk: String,
}

/// Descriptor for one partitioned table.
///
/// Unpartitioned tables have no descriptor: the resolver returns
/// `None` for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableInfo {
    Director(Arc<DirectorInfo>),
    Child(ChildInfo),
    Match(MatchInfo),
}

impl TableInfo {
    pub fn db(&self) -> &str {
        match self {
            TableInfo::Director(d) => &d.db,
            TableInfo::Child(c) => &c.db,
            TableInfo::Match(m) => &m.db,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TableInfo::Director(d) => &d.name,
            TableInfo::Child(c) => &c.name,
            TableInfo::Match(m) => &m.name,
        }
    }

    /// The shared director allocation, when this descriptor is one
    pub fn as_director(&self) -> Option<&Arc<DirectorInfo>> {
        match self {
            TableInfo::Director(d) => Some(d),
            _ => None,
        }
    }
}

impl fmt::Display for TableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            TableInfo::Director(_) => "director",
            TableInfo::Child(_) => "child",
            TableInfo::Match(_) => "match",
        };
        write!(f, "{} {}.{}", kind, self.db(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn director(name: &str) -> Arc<DirectorInfo> {
        Arc::new(DirectorInfo {
            db: "LSST".to_string(),
            name: name.to_string(),
            pk: "objectId".to_string(),
            lon: "ra".to_string(),
            lat: "decl".to_string(),
            partitioning_id: 17,
        })
    }

    #[test]
    fn test_accessors() {
        let dir = director("Object");
        let child = TableInfo::Child(ChildInfo {
            db: "LSST".to_string(),
            name: "Source".to_string(),
            director: dir.clone(),
            fk: "objectId".to_string(),
        });

        assert_eq!(child.db(), "LSST");
        assert_eq!(child.name(), "Source");
        assert!(child.as_director().is_none());
        assert!(TableInfo::Director(dir).as_director().is_some());
    }

    #[test]
    fn test_display() {
        let info = TableInfo::Director(director("Object"));
        assert_eq!(info.to_string(), "director LSST.Object");
    }
}
