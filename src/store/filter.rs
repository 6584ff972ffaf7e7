use crate::types::User;

/// Restricts a query to the rows owned by one user.
///
/// Every album and photo read in [`Store`](super::Store) takes a scope, and a
/// scope can only be built from an authenticated [`User`], so there is no
/// unscoped path to another user's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerScope {
    owner_id: i64,
}

impl OwnerScope {
    #[must_use]
    pub fn of(user: &User) -> Self {
        Self { owner_id: user.id }
    }

    #[must_use]
    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }
}

/// A column a list endpoint may be ordered by.
pub trait OrderField: Copy + Sized {
    fn parse(name: &str) -> Option<Self>;
    fn column(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumOrderField {
    CreatedAt,
    PhotosCount,
}

impl OrderField for AlbumOrderField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "created_at" => Some(Self::CreatedAt),
            "photos_count" => Some(Self::PhotosCount),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "a.created_at",
            Self::PhotosCount => "photos_amount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoOrderField {
    UploadedAt,
    Album,
}

impl OrderField for PhotoOrderField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "uploaded_at" => Some(Self::UploadedAt),
            "album" => Some(Self::Album),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::UploadedAt => "p.uploaded_at",
            Self::Album => "p.album_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey<F> {
    pub field: F,
    pub descending: bool,
}

/// Parses an `ordering` query value: comma separated field names, each
/// optionally prefixed with `-` for descending order. Unknown names are
/// skipped, as are repeats of a field already listed.
#[must_use]
pub fn parse_ordering<F: OrderField + PartialEq>(raw: Option<&str>) -> Vec<SortKey<F>> {
    let mut keys: Vec<SortKey<F>> = Vec::new();
    for part in raw.unwrap_or("").split(',') {
        let part = part.trim();
        let (name, descending) = match part.strip_prefix('-') {
            Some(name) => (name, true),
            None => (part, false),
        };
        if let Some(field) = F::parse(name) {
            if !keys.iter().any(|k| k.field == field) {
                keys.push(SortKey { field, descending });
            }
        }
    }
    keys
}

/// Builds an ORDER BY clause. The row id is always the final tie-breaker so
/// results are deterministic.
pub(crate) fn order_by_clause<F: OrderField>(keys: &[SortKey<F>], id_column: &str) -> String {
    let mut terms: Vec<String> = keys
        .iter()
        .map(|k| {
            format!(
                "{} {}",
                k.field.column(),
                if k.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();
    terms.push(format!("{id_column} ASC"));
    format!("ORDER BY {}", terms.join(", "))
}

/// Filters applied to a photo listing, always inside an owner scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoFilter {
    /// Photo must belong to one of these albums. Empty means any album.
    pub album_ids: Vec<i64>,
    /// Photo must carry at least one of these tags. Empty means no tag filter.
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ordering_single() {
        let keys: Vec<SortKey<AlbumOrderField>> = parse_ordering(Some("created_at"));
        assert_eq!(
            keys,
            vec![SortKey {
                field: AlbumOrderField::CreatedAt,
                descending: false
            }]
        );
    }

    #[test]
    fn test_parse_ordering_descending_and_multiple() {
        let keys: Vec<SortKey<PhotoOrderField>> = parse_ordering(Some("album,-uploaded_at"));
        assert_eq!(
            keys,
            vec![
                SortKey {
                    field: PhotoOrderField::Album,
                    descending: false
                },
                SortKey {
                    field: PhotoOrderField::UploadedAt,
                    descending: true
                },
            ]
        );
    }

    #[test]
    fn test_parse_ordering_ignores_unknown_and_repeats() {
        let keys: Vec<SortKey<AlbumOrderField>> =
            parse_ordering(Some("owner,photos_count,-photos_count,,title"));
        assert_eq!(
            keys,
            vec![SortKey {
                field: AlbumOrderField::PhotosCount,
                descending: false
            }]
        );
        assert!(parse_ordering::<AlbumOrderField>(None).is_empty());
    }

    #[test]
    fn test_order_by_clause() {
        let keys = vec![SortKey {
            field: AlbumOrderField::PhotosCount,
            descending: true,
        }];
        assert_eq!(
            order_by_clause(&keys, "a.id"),
            "ORDER BY photos_amount DESC, a.id ASC"
        );
        assert_eq!(
            order_by_clause::<AlbumOrderField>(&[], "a.id"),
            "ORDER BY a.id ASC"
        );
    }
}
