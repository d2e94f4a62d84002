//! Dependency-ordered comparison of deferred children.
//!
//! Under a channel-packing policy a child only has to follow the earlier
//! children it shares a channel with, so two child lists may describe the
//! same program in different orders. The comparison below walks both lists
//! as dependency graphs and matches nodes source by source.

use crate::models::Channel;

fn shares_channel(a: &[Channel], b: &[Channel]) -> bool {
    a.iter().any(|ch| b.contains(ch))
}

/// Compare two ordered child lists under the ordering freedom of a policy.
///
/// With `sequential` set, the lists must match pairwise. Otherwise a child
/// depends on every earlier child sharing one of its channels and the two
/// dependency graphs must be isomorphic with equal node labels. The graphs
/// are consumed greedily: each remaining left-hand node is matched with the
/// first equal right-hand node that has no remaining predecessor. Equal nodes
/// with a common channel are ordered against each other, so the greedy choice
/// never has to be undone.
///
/// # Arguments
/// * `lhs`, `rhs` - Ordered children
/// * `sequential` - Whether the policy totally orders its children
/// * `channels` - Channels of a child, sorted
/// * `eq` - Structural equality of two children
pub fn dependency_equivalent<T, C, E>(
    lhs: &[T],
    rhs: &[T],
    sequential: bool,
    channels: C,
    eq: E,
) -> bool
where
    C: Fn(&T) -> Vec<Channel>,
    E: Fn(&T, &T) -> bool,
{
    if lhs.len() != rhs.len() {
        return false;
    }
    if sequential {
        return lhs.iter().zip(rhs).all(|(a, b)| eq(a, b));
    }

    let rhs_channels: Vec<Vec<Channel>> = rhs.iter().map(&channels).collect();
    let mut remaining: Vec<usize> = (0..rhs.len()).collect();

    for node in lhs {
        let matched = remaining.iter().enumerate().position(|(pos, &candidate)| {
            eq(node, &rhs[candidate])
                && remaining[..pos]
                    .iter()
                    .all(|&earlier| !shares_channel(&rhs_channels[earlier], &rhs_channels[candidate]))
        });
        match matched {
            Some(pos) => {
                remaining.remove(pos);
            }
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    type Node = (&'static str, Vec<Channel>);

    fn check(lhs: &[Node], rhs: &[Node], sequential: bool) -> bool {
        dependency_equivalent(lhs, rhs, sequential, |n| n.1.clone(), |a, b| a == b)
    }

    #[test]
    fn test_independent_children_reorder_freely() {
        let d0 = Channel::drive(0);
        let d1 = Channel::drive(1);
        let lhs = vec![("x", vec![d0]), ("y", vec![d1])];
        let rhs = vec![("y", vec![d1]), ("x", vec![d0])];
        assert!(check(&lhs, &rhs, false));
        assert!(!check(&lhs, &rhs, true));
    }

    #[test]
    fn test_dependent_children_keep_order() {
        let d0 = Channel::drive(0);
        let lhs = vec![("x", vec![d0]), ("y", vec![d0])];
        let rhs = vec![("y", vec![d0]), ("x", vec![d0])];
        assert!(!check(&lhs, &rhs, false));
    }

    #[test]
    fn test_transitive_dependencies() {
        let d0 = Channel::drive(0);
        let d1 = Channel::drive(1);
        let u0 = Channel::control(0);
        // "c" depends on both "a" and "b"; "a" and "b" commute.
        let lhs = vec![("a", vec![d0]), ("b", vec![d1]), ("c", vec![d0, d1]), ("z", vec![u0])];
        let rhs = vec![("z", vec![u0]), ("b", vec![d1]), ("a", vec![d0]), ("c", vec![d0, d1])];
        assert!(check(&lhs, &rhs, false));

        let moved = vec![("a", vec![d0]), ("c", vec![d0, d1]), ("b", vec![d1]), ("z", vec![u0])];
        assert!(!check(&lhs, &moved, false));
    }

    #[test]
    fn test_length_mismatch() {
        let d0 = Channel::drive(0);
        assert!(!check(&[("x", vec![d0])], &[], false));
    }
}
