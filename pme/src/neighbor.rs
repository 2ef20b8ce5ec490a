use crystal::{SpaceGroup, UnitCell};

/// Real-space neighbor lists indexed by `[image][atom]`.
///
/// The asymmetric-unit list (`image == 0`) is a half list holding only `k > i`; the
/// symmetry-image lists hold every neighbor, including the atom's own mate (`k == i`),
/// which the pair kernels weight by one half. List *construction* for production runs
/// belongs to an external collaborator; [`NeighborLists::build`] is the quadratic
/// reference builder the fixtures and demo binaries use.
#[derive(Clone, Debug)]
pub struct NeighborLists {
    lists: Vec<Vec<Vec<usize>>>,
}

impl NeighborLists {
    /// Wraps externally built lists.
    pub fn from_lists(lists: Vec<Vec<Vec<usize>>>) -> Self {
        Self { lists }
    }

    /// Builds all-pairs lists within `cutoff` for every symmetry image.
    pub fn build(
        cell: &UnitCell,
        space_group: &SpaceGroup,
        coords: &[[f64; 3]],
        cutoff: f64,
    ) -> Self {
        let n = coords.len();
        let cutoff2 = cutoff * cutoff;
        let mut lists = Vec::with_capacity(space_group.num_images());

        for (s, op) in space_group.ops().iter().enumerate() {
            let mates: Vec<[f64; 3]> = coords.iter().map(|x| op.apply(x)).collect();
            let mut image_lists = Vec::with_capacity(n);
            for i in 0..n {
                let mut neighbors = Vec::new();
                let start = if s == 0 { i + 1 } else { 0 };
                for (k, mate) in mates.iter().enumerate().skip(start) {
                    let mut dx = [
                        mate[0] - coords[i][0],
                        mate[1] - coords[i][1],
                        mate[2] - coords[i][2],
                    ];
                    if cell.image(&mut dx) <= cutoff2 {
                        neighbors.push(k);
                    }
                }
                image_lists.push(neighbors);
            }
            lists.push(image_lists);
        }
        Self { lists }
    }

    pub fn num_images(&self) -> usize {
        self.lists.len()
    }

    pub fn num_atoms(&self) -> usize {
        self.lists.first().map_or(0, Vec::len)
    }

    pub fn neighbors(&self, image: usize, atom: usize) -> &[usize] {
        &self.lists[image][atom]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_half_list_in_asymmetric_unit() {
        let cell = UnitCell::aperiodic();
        let coords = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [20.0, 0.0, 0.0]];
        let lists = NeighborLists::build(&cell, &SpaceGroup::p1(), &coords, 5.0);

        assert_eq!(lists.num_images(), 1);
        assert_eq!(lists.neighbors(0, 0), &[1]);
        assert_eq!(lists.neighbors(0, 1), &[] as &[usize]);
        assert_eq!(lists.neighbors(0, 2), &[] as &[usize]);
    }

    #[test]
    fn test_periodic_wrap_finds_neighbor() {
        let cell = UnitCell::cubic(10.0).unwrap();
        let coords = [[0.5, 0.0, 0.0], [9.5, 0.0, 0.0]];
        let lists = NeighborLists::build(&cell, &SpaceGroup::p1(), &coords, 2.0);

        assert_eq!(lists.neighbors(0, 0), &[1]);
    }
}
