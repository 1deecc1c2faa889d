// SPDX-License-Identifier: AGPL-3.0-only

//! Spinor field container.
//!
//! A [`SpinorField`] pairs a descriptor and its derived [`SpinorLayout`] with
//! typed storage. Storage is either owned (allocated here, released by
//! `destroy`) or wrapped (a caller's buffer, borrowed for the field's
//! lifetime and never released here). Host and device fields share this one
//! type; [`FieldLocation`] selects the admissible orders.
//!
//! Site access is in register form: `load_site` fills `site_len` f64 values,
//! `save_site` stores them, re-deriving the site norm in half precision.

use std::fmt;
use std::ops::{Deref, DerefMut, Range};

use tracing::debug;

use crate::comm::{CommTopology, NeighborDir};
use crate::error::{HaloError, Result};
use crate::lattice::constants::N_DIM;
use crate::order::real::{gather, scatter};

use super::geometry::{Checkerboard, Coords};
use super::half::{inverse_norm, site_norm};
use super::layout::SpinorLayout;
use super::param::{
    FieldLocation, Precision, SiteOrder, SiteSubset, SpinorParam, SpinorParamUpdate,
};
use super::alloc_zeroed;

/// Owned or borrowed element buffer.
#[derive(Debug)]
pub enum Buffer<'a, T> {
    /// Allocated by the field.
    Owned(Vec<T>),
    /// Supplied by the caller.
    Wrapped(&'a mut [T]),
}

impl<T> Buffer<'_, T> {
    /// Whether the field owns this buffer.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

impl<T> Deref for Buffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match self {
            Self::Owned(v) => v,
            Self::Wrapped(s) => s,
        }
    }
}

impl<T> DerefMut for Buffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        match self {
            Self::Owned(v) => v,
            Self::Wrapped(s) => s,
        }
    }
}

/// Typed storage of a spinor field, tagged by precision.
#[derive(Debug)]
pub enum SpinorStorage<'a> {
    /// f64 elements.
    Double(Buffer<'a, f64>),
    /// f32 elements.
    Single(Buffer<'a, f32>),
    /// i16 elements with a per-site f32 norm array.
    Half {
        /// Fixed-point elements.
        data: Buffer<'a, i16>,
        /// Per-site norms.
        norm: Buffer<'a, f32>,
    },
}

impl SpinorStorage<'_> {
    /// Zeroed owned storage sized for `layout`.
    ///
    /// # Errors
    ///
    /// `Allocation` when the host cannot provide the buffers.
    pub fn allocate(layout: &SpinorLayout) -> Result<SpinorStorage<'static>> {
        let n = layout.elements();
        Ok(match layout.precision {
            Precision::Double => SpinorStorage::Double(Buffer::Owned(alloc_zeroed("spinor data", n)?)),
            Precision::Single => SpinorStorage::Single(Buffer::Owned(alloc_zeroed("spinor data", n)?)),
            Precision::Half => SpinorStorage::Half {
                data: Buffer::Owned(alloc_zeroed("spinor data", n)?),
                norm: Buffer::Owned(alloc_zeroed("spinor norm", layout.norm_elements())?),
            },
        })
    }

    /// Precision of the stored elements.
    #[must_use]
    pub const fn precision(&self) -> Precision {
        match self {
            Self::Double(_) => Precision::Double,
            Self::Single(_) => Precision::Single,
            Self::Half { .. } => Precision::Half,
        }
    }

    /// Elements in the data buffer.
    #[must_use]
    pub fn data_len(&self) -> usize {
        match self {
            Self::Double(b) => b.len(),
            Self::Single(b) => b.len(),
            Self::Half { data, .. } => data.len(),
        }
    }

    /// Entries in the norm buffer (0 unless half).
    #[must_use]
    pub fn norm_len(&self) -> usize {
        match self {
            Self::Half { norm, .. } => norm.len(),
            _ => 0,
        }
    }

    /// Whether every buffer is owned by the field.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        match self {
            Self::Double(b) => b.is_owned(),
            Self::Single(b) => b.is_owned(),
            Self::Half { data, norm } => data.is_owned() && norm.is_owned(),
        }
    }

    fn release(&mut self) {
        match self {
            Self::Double(b) => release(b),
            Self::Single(b) => release(b),
            Self::Half { data, norm } => {
                release(data);
                release(norm);
            }
        }
    }

    fn check_fits(&self, layout: &SpinorLayout) -> Result<()> {
        if self.precision() != layout.precision {
            return Err(HaloError::FieldMismatch {
                what: "precision",
                a: self.precision().to_string(),
                b: layout.precision.to_string(),
            });
        }
        if self.data_len() < layout.elements() {
            return Err(HaloError::BufferTooSmall {
                what: "data",
                need: layout.elements(),
                have: self.data_len(),
            });
        }
        if self.norm_len() < layout.norm_elements() {
            return Err(HaloError::BufferTooSmall {
                what: "norm",
                need: layout.norm_elements(),
                have: self.norm_len(),
            });
        }
        Ok(())
    }
}

fn release<T>(b: &mut Buffer<'_, T>) {
    if let Buffer::Owned(v) = b {
        *v = Vec::new();
    }
}

/// Offsets of one dimension's ghost region in a Parity field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GhostRef {
    /// First data element of the region.
    pub data: usize,
    /// First norm entry of the region (half precision only).
    pub norm: Option<usize>,
}

/// A checkerboarded spinor field with ghost zones.
#[derive(Debug)]
pub struct SpinorField<'a> {
    param: SpinorParam,
    partition: [bool; N_DIM],
    layout: SpinorLayout,
    storage: SpinorStorage<'a>,
    ghost: [Option<GhostRef>; N_DIM],
    init: bool,
}

impl SpinorField<'static> {
    /// Allocate a zeroed field for `param` on the process grid `topo`.
    ///
    /// # Errors
    ///
    /// Layout configuration errors, or `Allocation`.
    pub fn new(param: &SpinorParam, topo: &CommTopology) -> Result<Self> {
        let partition = topo.partition();
        let layout = SpinorLayout::compute(param, &partition)?;
        let storage = SpinorStorage::allocate(&layout)?;
        Ok(Self::assemble(param.clone(), partition, layout, storage))
    }
}

impl<'a> SpinorField<'a> {
    /// Reference caller-owned storage laid out for `param`.
    ///
    /// # Errors
    ///
    /// Layout configuration errors, a precision mismatch, or
    /// `BufferTooSmall`.
    pub fn wrap(param: &SpinorParam, topo: &CommTopology, storage: SpinorStorage<'a>) -> Result<Self> {
        let partition = topo.partition();
        let layout = SpinorLayout::compute(param, &partition)?;
        storage.check_fits(&layout)?;
        Ok(Self::assemble(param.clone(), partition, layout, storage))
    }

    fn assemble(
        param: SpinorParam,
        partition: [bool; N_DIM],
        layout: SpinorLayout,
        storage: SpinorStorage<'a>,
    ) -> Self {
        let mut f = Self {
            param,
            partition,
            layout,
            storage,
            ghost: [None; N_DIM],
            init: true,
        };
        f.create_ghost_zone();
        f
    }

    /// Descriptor that reproduces this field.
    #[must_use]
    pub fn fill(&self) -> SpinorParam {
        self.param.clone()
    }

    /// Derived layout.
    #[must_use]
    pub const fn layout(&self) -> &SpinorLayout {
        &self.layout
    }

    /// Partition mask the layout was computed for.
    #[must_use]
    pub const fn partition(&self) -> &[bool; N_DIM] {
        &self.partition
    }

    /// Host or device.
    #[must_use]
    pub const fn location(&self) -> FieldLocation {
        self.param.location
    }

    /// Element precision.
    #[must_use]
    pub const fn precision(&self) -> Precision {
        self.layout.precision
    }

    /// Full or single parity.
    #[must_use]
    pub const fn site_subset(&self) -> SiteSubset {
        self.layout.site_subset
    }

    /// Typed storage.
    #[must_use]
    pub const fn storage(&self) -> &SpinorStorage<'a> {
        &self.storage
    }

    /// Whether the field is constructed and not destroyed.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.init
    }

    /// Full-lattice geometry (a Parity field's `x[0]` doubled).
    ///
    /// # Errors
    ///
    /// `OddCheckerboard` for an odd fastest extent.
    pub fn checkerboard(&self) -> Result<Checkerboard> {
        let mut x = self.param.x.clone();
        if self.layout.site_subset == SiteSubset::Parity {
            x[0] *= 2;
        }
        Checkerboard::new(&x)
    }

    /// Re-derive the layout from `update` merged onto the current descriptor.
    ///
    /// Owned storage is reallocated when its size or precision changes;
    /// wrapped storage must already fit.
    ///
    /// # Errors
    ///
    /// `ResetBeforeInit` on a destroyed field, layout configuration errors,
    /// `BufferTooSmall` for wrapped storage, or `Allocation`.
    pub fn reset(&mut self, update: &SpinorParamUpdate) -> Result<()> {
        if !self.init {
            return Err(HaloError::ResetBeforeInit);
        }
        let param = update.merged_onto(&self.param);
        let layout = SpinorLayout::compute(&param, &self.partition)?;
        if self.storage.is_owned() {
            if self.storage.precision() != layout.precision
                || self.storage.data_len() != layout.elements()
                || self.storage.norm_len() != layout.norm_elements()
            {
                debug!(bytes = layout.bytes, norm_bytes = layout.norm_bytes, "reallocating spinor");
                self.storage = SpinorStorage::allocate(&layout)?;
            }
        } else {
            self.storage.check_fits(&layout)?;
        }
        self.param = param;
        self.layout = layout;
        self.clear_ghost_pointers();
        self.create_ghost_zone();
        Ok(())
    }

    /// Fail with `Uninitialized` once [`Self::destroy`] has run.
    ///
    /// # Errors
    ///
    /// `Uninitialized` naming `call`.
    pub fn ensure_initialized(&self, call: &'static str) -> Result<()> {
        if self.init {
            Ok(())
        } else {
            Err(HaloError::Uninitialized { call })
        }
    }

    /// Release owned storage and mark the field uninitialised.
    pub fn destroy(&mut self) {
        self.storage.release();
        self.clear_ghost_pointers();
        self.init = false;
    }

    /// Null every ghost reference.
    pub fn clear_ghost_pointers(&mut self) {
        self.ghost = [None; N_DIM];
    }

    /// Point ghost references at each partitioned dimension's region.
    ///
    /// Only Parity fields carry references; a Full field addresses its
    /// ghosts per half through the layout.
    pub fn create_ghost_zone(&mut self) {
        self.clear_ghost_pointers();
        if self.layout.site_subset != SiteSubset::Parity {
            return;
        }
        let has_norm = self.layout.precision.has_norm();
        for d in (0..N_DIM).filter(|&d| self.layout.ghost.is_active(d)) {
            self.ghost[d] = Some(GhostRef {
                data: self.layout.ghost_base(0, d),
                norm: has_norm.then(|| self.layout.ghost_norm_base(0, d)),
            });
        }
    }

    fn parity_only(&self, call: &'static str) -> Result<()> {
        if self.layout.site_subset == SiteSubset::Full {
            return Err(HaloError::UnsupportedSiteSubset {
                call,
                subset: self.layout.site_subset.to_string(),
            });
        }
        Ok(())
    }

    /// First element of dimension `d`'s ghost region.
    ///
    /// # Errors
    ///
    /// `UnsupportedSiteSubset` on a Full field.
    pub fn ghost(&self, d: usize) -> Result<Option<usize>> {
        self.parity_only("ghost")?;
        Ok(self.ghost.get(d).copied().flatten().map(|g| g.data))
    }

    /// First norm entry of dimension `d`'s ghost norm region.
    ///
    /// # Errors
    ///
    /// `UnsupportedSiteSubset` on a Full field.
    pub fn ghost_norm(&self, d: usize) -> Result<Option<usize>> {
        self.parity_only("ghost_norm")?;
        Ok(self.ghost.get(d).copied().flatten().and_then(|g| g.norm))
    }

    /// Storage half holding `parity`.
    #[must_use]
    pub const fn half_of(&self, parity: usize) -> usize {
        match (self.layout.site_subset, self.param.site_order) {
            (SiteSubset::Parity, _) => 0,
            (SiteSubset::Full, SiteOrder::OddEven) => 1 - (parity & 1),
            (SiteSubset::Full, _) => parity & 1,
        }
    }

    /// Parities held: both for a Full field, `parity` for a Parity field.
    #[must_use]
    pub const fn held_parities(&self, parity: usize) -> Range<usize> {
        match self.layout.site_subset {
            SiteSubset::Full => 0..2,
            SiteSubset::Parity => parity..parity + 1,
        }
    }

    /// Load site `x` of `parity` into `out[..site_len]`.
    ///
    /// # Panics
    ///
    /// On a destroyed field, or when `x` is outside the local volume.
    pub fn load_site(&self, parity: usize, x: usize, out: &mut [f64]) {
        let half = self.half_of(parity);
        let l = &self.layout;
        let out = &mut out[..l.site_len];
        let index = |i| l.body_index(half, x, i);
        match &self.storage {
            SpinorStorage::Double(b) => gather(b, 1.0, index, out),
            SpinorStorage::Single(b) => gather(b, 1.0, index, out),
            SpinorStorage::Half { data, norm } => {
                gather(data, f64::from(norm[l.norm_index(half, x)]), index, out);
            }
        }
    }

    /// Store `values[..site_len]` at site `x` of `parity`.
    ///
    /// # Panics
    ///
    /// On a destroyed field, or when `x` is outside the local volume.
    pub fn save_site(&mut self, parity: usize, x: usize, values: &[f64]) {
        let half = self.half_of(parity);
        let l = &self.layout;
        let values = &values[..l.site_len];
        let index = |i| l.body_index(half, x, i);
        match &mut self.storage {
            SpinorStorage::Double(b) => scatter(b, 1.0, index, values),
            SpinorStorage::Single(b) => scatter(b, 1.0, index, values),
            SpinorStorage::Half { data, norm } => {
                let n = site_norm(values);
                norm[l.norm_index(half, x)] = n;
                scatter(data, inverse_norm(n), index, values);
            }
        }
    }

    /// Load ghost site `g` of the block received `from` along `d` into
    /// `out[..ghost_site_len]`.
    ///
    /// # Panics
    ///
    /// On a destroyed field, or when `g` is outside the ghost block.
    pub fn load_ghost_site(
        &self,
        parity: usize,
        d: usize,
        from: NeighborDir,
        g: usize,
        out: &mut [f64],
    ) {
        let half = self.half_of(parity);
        let l = &self.layout;
        let out = &mut out[..l.ghost.ghost_site_len];
        let index = |i| l.ghost_index(half, d, from, g, i);
        match &self.storage {
            SpinorStorage::Double(b) => gather(b, 1.0, index, out),
            SpinorStorage::Single(b) => gather(b, 1.0, index, out),
            SpinorStorage::Half { data, norm } => {
                gather(data, f64::from(norm[l.ghost_norm_index(half, d, from, g)]), index, out);
            }
        }
    }

    /// Store ghost site `g` of the block received `from` along `d`.
    ///
    /// # Panics
    ///
    /// On a destroyed field, or when `g` is outside the ghost block.
    pub fn save_ghost_site(
        &mut self,
        parity: usize,
        d: usize,
        from: NeighborDir,
        g: usize,
        values: &[f64],
    ) {
        let half = self.half_of(parity);
        let l = &self.layout;
        let values = &values[..l.ghost.ghost_site_len];
        let index = |i| l.ghost_index(half, d, from, g, i);
        match &mut self.storage {
            SpinorStorage::Double(b) => scatter(b, 1.0, index, values),
            SpinorStorage::Single(b) => scatter(b, 1.0, index, values),
            SpinorStorage::Half { data, norm } => {
                let n = site_norm(values);
                norm[l.ghost_norm_index(half, d, from, g)] = n;
                scatter(data, inverse_norm(n), index, values);
            }
        }
    }

    /// Byte views of one ghost block: data, then norms for half precision.
    pub(crate) fn ghost_block_bytes_mut(
        &mut self,
        parity: usize,
        d: usize,
        from: NeighborDir,
    ) -> (&mut [u8], Option<&mut [u8]>) {
        let half = self.half_of(parity);
        let g = &self.layout.ghost;
        let start = self.layout.ghost_base(half, d) + from.block() * g.block_reals(d);
        let data = start..start + g.block_reals(d);
        let nstart = self.layout.ghost_norm_base(half, d) + from.block() * g.block_sites(d);
        let norms = nstart..nstart + g.block_sites(d);
        match &mut self.storage {
            SpinorStorage::Double(b) => (bytemuck::cast_slice_mut(&mut b[data]), None),
            SpinorStorage::Single(b) => (bytemuck::cast_slice_mut(&mut b[data]), None),
            SpinorStorage::Half { data: s, norm } => (
                bytemuck::cast_slice_mut(&mut s[data]),
                Some(bytemuck::cast_slice_mut(&mut norm[norms])),
            ),
        }
    }

    /// Overwrite every real site held with `f(coords, parity, site)`.
    ///
    /// A Parity field holds `parity`; a Full field ignores it.
    ///
    /// # Errors
    ///
    /// `Uninitialized` on a destroyed field, `OddCheckerboard` from the
    /// site geometry.
    pub fn fill_sites<F>(&mut self, parity: usize, mut f: F) -> Result<()>
    where
        F: FnMut(&Coords, usize, &mut [f64]),
    {
        self.ensure_initialized("fill_sites")?;
        let cb = self.checkerboard()?;
        let mut site = vec![0.0; self.layout.site_len];
        for p in self.held_parities(parity) {
            for x in 0..self.layout.volume_cb {
                site.fill(0.0);
                f(&cb.coords(x, p), p, &mut site);
                self.save_site(p, x, &site);
            }
        }
        Ok(())
    }
}

impl fmt::Display for SpinorField<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.param;
        writeln!(f, "location = {}", p.location)?;
        writeln!(f, "nColor = {}", p.n_color)?;
        writeln!(f, "nSpin = {}", p.n_spin)?;
        writeln!(f, "twistFlavor = {}", p.twist_flavor)?;
        writeln!(f, "nDim = {}", p.n_dim)?;
        for (d, x) in p.x.iter().enumerate() {
            writeln!(f, "x[{d}] = {x}")?;
        }
        writeln!(f, "precision = {}", p.precision)?;
        writeln!(f, "pad = {}", p.pad)?;
        writeln!(f, "siteSubset = {}", p.site_subset)?;
        writeln!(f, "siteOrder = {}", p.site_order)?;
        writeln!(f, "fieldOrder = {}", p.field_order)?;
        writeln!(f, "gammaBasis = {}", p.gamma_basis)?;
        write!(f, "{}", self.layout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn wilson(prec: Precision, subset: SiteSubset) -> SpinorParam {
        SpinorParam::wilson(&[4, 4, 4, 4], prec, subset)
    }

    #[test]
    fn site_round_trip_per_precision() {
        for prec in [Precision::Double, Precision::Single] {
            let mut f = SpinorField::new(&wilson(prec, SiteSubset::Full), &CommTopology::single())
                .expect("field");
            let v: Vec<f64> = (0..24).map(|i| f64::from(i) * 0.25 - 3.0).collect();
            f.save_site(1, 17, &v);
            let mut out = vec![0.0; 24];
            f.load_site(1, 17, &mut out);
            assert_eq!(out, v, "{prec}");
            f.load_site(0, 17, &mut out);
            assert!(out.iter().all(|&x| x == 0.0));
        }
    }

    #[test]
    fn half_site_recovers_within_one_step() {
        let mut f = SpinorField::new(&wilson(Precision::Half, SiteSubset::Parity), &CommTopology::single())
            .expect("field");
        let v: Vec<f64> = (0..24).map(|i| (f64::from(i) * 0.37).sin()).collect();
        f.save_site(0, 3, &v);
        let mut out = vec![0.0; 24];
        f.load_site(0, 3, &mut out);
        let step = crate::field::half::quantization_step(site_norm(&v));
        for (a, b) in v.iter().zip(&out) {
            assert!((a - b).abs() <= step);
        }
    }

    #[test]
    fn odd_even_order_swaps_halves() {
        let mut p = wilson(Precision::Double, SiteSubset::Full);
        p.site_order = SiteOrder::OddEven;
        let f = SpinorField::new(&p, &CommTopology::single()).expect("field");
        assert_eq!(f.half_of(0), 1);
        assert_eq!(f.half_of(1), 0);
    }

    #[test]
    fn ghost_refs_only_on_parity_fields() {
        let topo = CommTopology::new([1, 1, 1, 2], 0).expect("topology");
        let full = SpinorField::new(&wilson(Precision::Half, SiteSubset::Full), &topo).expect("field");
        assert!(matches!(
            full.ghost(3),
            Err(HaloError::UnsupportedSiteSubset { call: "ghost", .. })
        ));

        let mut p = wilson(Precision::Half, SiteSubset::Parity);
        p.x[0] = 2;
        let par = SpinorField::new(&p, &topo).expect("field");
        let l = par.layout();
        assert_eq!(par.ghost(3).expect("parity"), Some(l.stride * l.site_len));
        assert_eq!(par.ghost_norm(3).expect("parity"), Some(l.stride));
        assert_eq!(par.ghost(2).expect("parity"), None);
    }

    #[test]
    fn reset_keeps_unset_members_and_reallocates() {
        let mut f = SpinorField::new(&wilson(Precision::Single, SiteSubset::Full), &CommTopology::single())
            .expect("field");
        let update = SpinorParamUpdate {
            precision: Some(Precision::Half),
            ..SpinorParamUpdate::default()
        };
        f.reset(&update).expect("reset");
        assert_eq!(f.precision(), Precision::Half);
        assert_eq!(f.storage().precision(), Precision::Half);
        assert_eq!(f.fill().x, vec![4, 4, 4, 4]);
        assert_eq!(f.storage().norm_len(), f.layout().norm_elements());
    }

    #[test]
    fn reset_after_destroy_is_rejected() {
        let mut f = SpinorField::new(&wilson(Precision::Double, SiteSubset::Full), &CommTopology::single())
            .expect("field");
        f.destroy();
        assert!(!f.is_initialized());
        assert_eq!(f.storage().data_len(), 0);
        assert!(matches!(
            f.reset(&SpinorParamUpdate::default()),
            Err(HaloError::ResetBeforeInit)
        ));
    }

    #[test]
    fn wrapped_storage_survives_destroy() {
        let p = wilson(Precision::Double, SiteSubset::Parity);
        let layout = SpinorLayout::compute(&p, &[false; N_DIM]).expect("layout");
        let mut backing = vec![0.0_f64; layout.elements()];
        {
            let mut f = SpinorField::wrap(
                &p,
                &CommTopology::single(),
                SpinorStorage::Double(Buffer::Wrapped(&mut backing)),
            )
            .expect("wrap");
            f.save_site(0, 0, &[1.5; 24]);
            f.destroy();
            assert_eq!(f.storage().data_len(), layout.elements());
        }
        assert_eq!(backing[0], 1.5);
    }

    #[test]
    fn wrapped_storage_must_fit_after_reset() {
        let p = wilson(Precision::Double, SiteSubset::Parity);
        let layout = SpinorLayout::compute(&p, &[false; N_DIM]).expect("layout");
        let mut backing = vec![0.0_f64; layout.elements()];
        let mut f = SpinorField::wrap(
            &p,
            &CommTopology::single(),
            SpinorStorage::Double(Buffer::Wrapped(&mut backing)),
        )
        .expect("wrap");
        let grow = SpinorParamUpdate {
            pad: Some(4096),
            ..SpinorParamUpdate::default()
        };
        assert!(matches!(
            f.reset(&grow),
            Err(HaloError::BufferTooSmall { what: "data", .. })
        ));
    }

    #[test]
    fn fill_sites_visits_every_held_site() {
        let mut p = SpinorParam::staggered(&[2, 4, 4, 4], Precision::Double, SiteSubset::Parity);
        p.pad = 3;
        let mut f = SpinorField::new(&p, &CommTopology::single()).expect("field");
        f.fill_sites(1, |c, parity, site| {
            assert_eq!(Checkerboard::parity_of(c), parity);
            site[0] = 1.0;
        })
        .expect("fill");
        let mut out = vec![0.0; 6];
        let mut total = 0.0;
        for x in 0..f.layout().volume_cb {
            f.load_site(1, x, &mut out);
            total += out[0];
        }
        assert_eq!(total, 128.0);
    }

    #[test]
    fn display_lists_descriptor_and_layout() {
        let f = SpinorField::new(&wilson(Precision::Single, SiteSubset::Full), &CommTopology::single())
            .expect("field");
        let s = f.to_string();
        assert!(s.contains("nSpin = 4"));
        assert!(s.contains("stride = 128"));
    }
}
