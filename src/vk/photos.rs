//! Profile photo selection.

use super::types::{PhotoRef, VkPhoto};

/// Pick the `limit` most liked photos, each at its largest rendition.
///
/// Photos without any rendition are skipped. Equal like counts keep the
/// order VK returned them in.
pub fn select_best_photos(photos: &[VkPhoto], limit: usize) -> Vec<PhotoRef> {
    let mut selected: Vec<PhotoRef> = photos
        .iter()
        .filter_map(|photo| {
            let largest = photo.sizes.iter().max_by_key(|size| size.longest_side())?;
            Some(PhotoRef {
                owner_id: photo.owner_id,
                photo_id: photo.id,
                url: largest.url.clone(),
                likes: photo.likes.as_ref().map(|likes| likes.count).unwrap_or(0),
            })
        })
        .collect();

    selected.sort_by(|a, b| b.likes.cmp(&a.likes));
    selected.truncate(limit);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vk::types::{Likes, PhotoSize};

    fn photo(id: i64, likes: i64, sizes: &[(u32, u32)]) -> VkPhoto {
        VkPhoto {
            id,
            owner_id: 100,
            sizes: sizes
                .iter()
                .map(|(w, h)| PhotoSize {
                    kind: "x".to_string(),
                    url: format!("https://img/{id}/{w}x{h}"),
                    width: *w,
                    height: *h,
                })
                .collect(),
            likes: Some(Likes { count: likes }),
        }
    }

    #[test]
    fn test_top_three_by_likes() {
        let photos = vec![
            photo(1, 5, &[(100, 100)]),
            photo(2, 50, &[(100, 100)]),
            photo(3, 20, &[(100, 100)]),
            photo(4, 30, &[(100, 100)]),
        ];

        let best = select_best_photos(&photos, 3);
        let ids: Vec<i64> = best.iter().map(|p| p.photo_id).collect();
        assert_eq!(ids, vec![2, 4, 3]);
        assert_eq!(best[0].attachment(), "photo100_2");
    }

    #[test]
    fn test_largest_rendition_is_used() {
        let photos = vec![photo(9, 1, &[(130, 87), (604, 403), (200, 1280)])];
        let best = select_best_photos(&photos, 3);
        assert_eq!(best[0].url, "https://img/9/200x1280");
    }

    #[test]
    fn test_ties_keep_input_order_and_empty_sizes_are_skipped() {
        let photos = vec![
            photo(1, 10, &[(10, 10)]),
            photo(2, 10, &[]),
            photo(3, 10, &[(10, 10)]),
        ];
        let best = select_best_photos(&photos, 3);
        let ids: Vec<i64> = best.iter().map(|p| p.photo_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
