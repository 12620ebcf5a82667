//! Named physical quantities stored on a partition.
//!
//! A field of tensor rank `r` on a `d`-dimensional mesh carries `d^r`
//! components, each with its own [`DataPartition`]. Scalars (`r = 0`) have
//! exactly one.

use std::ops::{AddAssign, DivAssign, MulAssign, RemAssign, SubAssign};
use std::sync::Arc;

use bytemuck::Pod;
use num_traits::Float;

use crate::algs::communicator::Communicator;
use crate::data::{DataPartition, DataPartitionOptions, Levels, MutableNdArrayView, NdArray};
use crate::geometry::{Bounds, IndexBox};
use crate::halo_error::HaloError;
use crate::mesh::GridMesh;
use crate::partitioning::Partition;

/// A named field: unit, tensor rank and the distributed storage of each
/// component.
///
/// With `bounds`, the field lives on a copy of the partition restricted to
/// that region; domains outside it are not allocated.
pub struct Field<T, C, A = NdArray<T>> {
    name: String,
    unit: String,
    tensor_rank: usize,
    requested: Bounds,
    components: Vec<DataPartition<T, C, A>>,
}

impl<T, C, A> Field<T, C, A>
where
    T: Pod + Default,
    C: Communicator,
    A: MutableNdArrayView<T>,
{
    /// Scalar field.
    pub fn new(
        partition: Arc<Partition>,
        name: impl Into<String>,
        unit: impl Into<String>,
        comm: C,
        bounds: Option<&Bounds>,
    ) -> Result<Self, HaloError> {
        Self::with_options(partition, name, unit, comm, bounds, DataPartitionOptions::default())
    }

    pub fn with_options(
        partition: Arc<Partition>,
        name: impl Into<String>,
        unit: impl Into<String>,
        comm: C,
        bounds: Option<&Bounds>,
        options: DataPartitionOptions,
    ) -> Result<Self, HaloError> {
        Self::build(partition, name.into(), unit.into(), 0, vec![comm], bounds, options)
    }

    fn build(
        partition: Arc<Partition>,
        name: String,
        unit: String,
        tensor_rank: usize,
        comms: Vec<C>,
        bounds: Option<&Bounds>,
        options: DataPartitionOptions,
    ) -> Result<Self, HaloError> {
        let requested = bounds.cloned().unwrap_or_else(|| partition.bounds().clone());
        let partition = match bounds {
            Some(bounds) => Arc::new(partition.restrict(bounds)?),
            None => partition,
        };
        log::debug!(
            "field {name}: tensor rank {tensor_rank}, {} components, {} domains on bounds {:?}",
            comms.len(),
            partition.domains().len(),
            partition.bounds()
        );
        let components = comms
            .into_iter()
            .map(|comm| DataPartition::with_options(Arc::clone(&partition), comm, options.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name,
            unit,
            tensor_rank,
            requested,
            components,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// 0 for scalars, 1 for vectors, 2 for second-order tensors.
    pub fn tensor_rank(&self) -> usize {
        self.tensor_rank
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Physical region the field covers (snapped to mesh nodes).
    pub fn bounds(&self) -> &Bounds {
        self.partition().bounds()
    }

    /// Bounds as given at construction, before snapping.
    pub fn requested_bounds(&self) -> &Bounds {
        &self.requested
    }

    /// Global index box of the nodes the field covers.
    pub fn region(&self) -> IndexBox {
        let mesh = self.partition().mesh();
        let (lo, hi) = self.bounds();
        let stop = mesh.nearest_node(hi).into_iter().map(|i| i + 1).collect();
        IndexBox::new(mesh.nearest_node(lo), stop)
    }

    pub fn partition(&self) -> &Arc<Partition> {
        self.components[0].partition()
    }

    /// Storage of the first component (the only one for scalars).
    pub fn data(&self) -> &DataPartition<T, C, A> {
        &self.components[0]
    }

    pub fn data_mut(&mut self) -> &mut DataPartition<T, C, A> {
        &mut self.components[0]
    }

    pub fn component(&self, i: usize) -> Option<&DataPartition<T, C, A>> {
        self.components.get(i)
    }

    pub fn component_mut(&mut self, i: usize) -> Option<&mut DataPartition<T, C, A>> {
        self.components.get_mut(i)
    }

    pub fn components(&self) -> &[DataPartition<T, C, A>] {
        &self.components
    }

    /// Global index of the node nearest to `point`, if the point lies inside
    /// the bounds the field was created with.
    fn node_at(&self, point: &[f64]) -> Option<Vec<usize>> {
        let (lo, hi) = &self.requested;
        if point.len() != lo.len()
            || point.iter().zip(lo.iter().zip(hi)).any(|(p, (l, h))| p < l || p > h)
        {
            return None;
        }
        Some(self.partition().mesh().nearest_node(point))
    }

    /// Value of the first component at the node nearest to `point`, if the
    /// point lies inside the field's bounds and this rank owns that node.
    pub fn value_at(&self, point: &[f64]) -> Option<T> {
        self.components[0].value(&self.node_at(point)?)
    }

    /// Every component at the node nearest to `point`.
    pub fn components_at(&self, point: &[f64]) -> Option<Vec<T>> {
        let node = self.node_at(point)?;
        self.components.iter().map(|c| c.value(&node)).collect()
    }

    /// Apply `f(global_index, value)` to the interior nodes of every component.
    pub fn map_interior(&mut self, mut f: impl FnMut(&[usize], T) -> T) {
        for c in &mut self.components {
            c.map_interior(&mut f);
        }
    }

    /// Element-wise `self = f(self, other)` on interior nodes. Both fields
    /// must live on the same partition and have the same number of
    /// components.
    pub fn combine(&mut self, other: &Field<T, C, A>, mut f: impl FnMut(T, T) -> T) -> Result<(), HaloError> {
        if self.partition().domains() != other.partition().domains() {
            return Err(HaloError::ShapeMismatch {
                expected: self.partition().shape(),
                found: other.partition().shape(),
            });
        }
        if self.n_components() != other.n_components() {
            return Err(HaloError::ShapeMismatch {
                expected: vec![self.n_components()],
                found: vec![other.n_components()],
            });
        }
        for (lhs, rhs) in self.components.iter_mut().zip(&other.components) {
            for (mine, theirs) in lhs.domains_mut().iter_mut().zip(rhs.domains()) {
                let window = mine.local_interior();
                let r = theirs.data.read_window(&window)?;
                let mut l = mine.data.read_window(&window)?;
                for (a, b) in l.iter_mut().zip(r) {
                    *a = f(*a, b);
                }
                mine.data.write_window(&window, &l)?;
            }
        }
        Ok(())
    }

    /// Broadcast `values` along `axes`: every interior node `idx` becomes
    /// `f(old, values[idx[axes[0]], idx[axes[1]], ..])`.
    ///
    /// `values` spans the field's [region](Field::region) on the selected
    /// axes: a vector for one axis, a plane for two. Indices are relative to
    /// the region start.
    pub fn apply_along(
        &mut self,
        axes: &[usize],
        values: &NdArray<T>,
        mut f: impl FnMut(T, T) -> T,
    ) -> Result<(), HaloError>
    where
        NdArray<T>: MutableNdArrayView<T>,
    {
        let region = self.region();
        if axes.len() != values.shape().len() {
            return Err(HaloError::DimensionMismatch {
                context: "broadcast axes",
                expected: values.shape().len(),
                found: axes.len(),
            });
        }
        if let Some(&axis) = axes.iter().find(|&&a| a >= region.ndim()) {
            return Err(HaloError::DimensionMismatch {
                context: "broadcast axis",
                expected: region.ndim(),
                found: axis + 1,
            });
        }
        let extent = region.shape();
        let expected: Vec<usize> = axes.iter().map(|&a| extent[a]).collect();
        if expected.as_slice() != values.shape() {
            return Err(HaloError::ShapeMismatch {
                expected,
                found: values.shape().to_vec(),
            });
        }

        let start = region.start;
        let mut at = vec![0; axes.len()];
        for c in &mut self.components {
            c.map_interior(|idx, v| {
                for (k, &a) in axes.iter().enumerate() {
                    at[k] = idx[a] - start[a];
                }
                values.get(&at).map_or(v, |&x| f(v, x))
            });
        }
        Ok(())
    }

    /// Element-wise `f(old, values[idx - region.start])` with `values`
    /// shaped like the field's region.
    pub fn apply_global(&mut self, values: &NdArray<T>, f: impl FnMut(T, T) -> T) -> Result<(), HaloError>
    where
        NdArray<T>: MutableNdArrayView<T>,
    {
        let axes: Vec<usize> = (0..self.region().ndim()).collect();
        self.apply_along(&axes, values, f)
    }

    pub fn powf(&mut self, exp: T)
    where
        T: Float,
    {
        self.map_interior(|_, v| v.powf(exp));
    }

    pub fn powi(&mut self, exp: i32)
    where
        T: Float,
    {
        self.map_interior(|_, v| v.powi(exp));
    }

    pub fn sync(&mut self, levels: impl Into<Levels>) -> Result<(), HaloError> {
        let levels = levels.into();
        for c in &mut self.components {
            c.sync(levels.clone())?;
        }
        Ok(())
    }

    pub fn sync_all(&mut self) -> Result<(), HaloError> {
        self.sync(Levels::All)
    }
}

impl<T, C, A> Field<T, C, A>
where
    T: Pod + Default,
    C: Communicator + Clone,
    A: MutableNdArrayView<T>,
{
    /// Field of tensor rank `tensor_rank`: `dimension^tensor_rank`
    /// components sharing one communicator. Components sync one after the
    /// other, in index order.
    pub fn tensor(
        partition: Arc<Partition>,
        name: impl Into<String>,
        unit: impl Into<String>,
        comm: C,
        tensor_rank: usize,
        bounds: Option<&Bounds>,
    ) -> Result<Self, HaloError> {
        let n = partition.dimension().pow(tensor_rank as u32);
        Self::build(
            partition,
            name.into(),
            unit.into(),
            tensor_rank,
            vec![comm; n],
            bounds,
            DataPartitionOptions::default(),
        )
    }
}

macro_rules! scalar_assign {
    ($($trait:ident :: $method:ident),*) => {$(
        impl<T, C, A> $trait<T> for Field<T, C, A>
        where
            T: Pod + Default + $trait,
            C: Communicator,
            A: MutableNdArrayView<T>,
        {
            fn $method(&mut self, rhs: T) {
                self.map_interior(|_, mut v| {
                    v.$method(rhs);
                    v
                });
            }
        }
    )*};
}

scalar_assign!(
    AddAssign::add_assign,
    SubAssign::sub_assign,
    MulAssign::mul_assign,
    DivAssign::div_assign,
    RemAssign::rem_assign
);
