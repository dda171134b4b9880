use super::*;
use enumset::EnumSet;

impl ScalarDType {
    const fn promotion_lattice(self) -> &'static [Self] {
        use ScalarDType::*;
        match self {
            Int8 => &[Int32],
            Int32 => &[Float32],
            Real => &[Float32],
            Float32 => &[Float64],
            Float64 => &[],
        }
    }

    fn get_recursive_parents(self) -> EnumSet<Self> {
        self.promotion_lattice()
            .iter()
            .fold(EnumSet::only(self), |dtypes, &parent| dtypes.union(parent.get_recursive_parents()))
    }

    /// Check if a value of `self` can be stored into `to` without losing precision.
    ///
    /// `Real` is compatible with every float kind in both directions: it stands
    /// for "whatever precision the kernel is eventually given".
    pub fn can_safe_cast(self, to: Self) -> bool {
        if self == to {
            return true;
        }
        if (self == Self::Real && to.is_float()) || (to == Self::Real && self.is_float()) {
            return true;
        }
        self.get_recursive_parents().contains(to)
    }

    /// Least upper bound of element kinds under the promotion lattice.
    ///
    /// `Real` defers to the other operand.
    pub fn least_upper(kinds: &[Self]) -> Option<Self> {
        let concrete: Vec<Self> = kinds.iter().copied().filter(|k| *k != Self::Real).collect();
        if concrete.is_empty() {
            return kinds.first().copied();
        }
        let common = concrete
            .iter()
            .fold(EnumSet::all(), |acc: EnumSet<Self>, k| acc.intersection(k.get_recursive_parents()));
        // Lattice is a chain above each node, so the smallest discriminant is the LUB.
        common.iter().min()
    }
}
