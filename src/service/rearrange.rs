use crate::types::clip::Clip;

/// Longest selection rearranged; the search is exponential in the worst case.
pub const MAX_REARRANGE_LEN: usize = 15;

/// Reorder `items` so that no two neighbours share the same key.
///
/// Elements before `start` stay in place. Returns `false` when no such order
/// exists, in which case `items` is left exactly as it was.
pub fn rearrange<T, K, F>(items: &mut [T], key: F, start: usize) -> bool
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    if items.len() < 3 {
        return true;
    }
    dfs(items, &key, start)
}

fn dfs<T, K, F>(items: &mut [T], key: &F, i: usize) -> bool
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    if i >= items.len() {
        return true;
    }

    if (i == 0 || key(&items[i - 1]) != key(&items[i])) && dfs(items, key, i + 1) {
        return true;
    }

    for j in i + 1..items.len() {
        if i == 0 || key(&items[i - 1]) != key(&items[j]) {
            items.swap(i, j);
            if dfs(items, key, i + 1) {
                return true;
            }
            items.swap(i, j);
        }
    }
    false
}

/// Avoid the same broadcaster twice in a row, keeping the top clip first.
/// Selections of `max_len` clips or more are returned unchanged.
pub fn rearrange_clips(mut clips: Vec<Clip>, max_len: usize) -> Vec<Clip> {
    if clips.len() < max_len {
        rearrange(&mut clips, |c: &Clip| c.broadcaster_name.clone(), 1);
    }
    clips
}
