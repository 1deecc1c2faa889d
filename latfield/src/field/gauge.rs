// SPDX-License-Identifier: AGPL-3.0-only

//! Gauge fields in every supported order.
//!
//! A [`GaugeField<T>`] owns the link storage of one order, typed by its
//! element `T`, plus the ghost links of each partitioned dimension. It is the
//! concrete [`GaugeOrder`]: each access dispatches once on the
//! (order, reconstruction) pair validated at construction.
//!
//! Ghost links of dimension `d` live in separate arrays (legacy orders
//! always, FloatN on request) or in the FloatN pad at `x + volume_cb`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comm::CommTopology;
use crate::error::{HaloError, Result};
use crate::lattice::constants::{align_up, LINK_REALS, N_DIM};
use crate::order::index::{self, FloatN};
use crate::order::real::{gather, scatter, StorageReal};
use crate::order::{AccessPath, Codec, GaugeFieldOrder, GaugeOrder, Link, Reconstruct};

use super::alloc_zeroed;
use super::geometry::{Checkerboard, Coords};
use super::param::Precision;

/// Temporal boundary condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TBoundary {
    /// Links on the last time slice are stored as is.
    Periodic,
    /// Links on the last time slice carry a minus sign.
    AntiPeriodic,
}

impl TBoundary {
    /// Sign applied on the last global time slice.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Periodic => 1.0,
            Self::AntiPeriodic => -1.0,
        }
    }
}

/// Links per site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkGeometry {
    /// One matrix per site (staples, momenta).
    Scalar,
    /// One link per direction.
    Vector,
}

impl LinkGeometry {
    /// Directions stored per site.
    #[must_use]
    pub const fn dirs(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vector => N_DIM,
        }
    }
}

/// Descriptor of a gauge field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaugeParam {
    /// Local extents.
    pub x: [usize; N_DIM],
    /// Element precision.
    pub precision: Precision,
    /// Flattening.
    pub order: GaugeFieldOrder,
    /// Reconstruction level (FloatN only).
    pub reconstruct: Reconstruct,
    /// Extra sites per parity (FloatN), also holding pad ghosts.
    pub pad: usize,
    /// Spatial link scale.
    pub anisotropy: f64,
    /// Temporal boundary condition.
    pub t_boundary: TBoundary,
    /// Ghost slices per boundary.
    pub n_face: usize,
    /// Links per site.
    pub geometry: LinkGeometry,
    /// FloatN ghosts in separate arrays instead of the pad.
    pub separate_ghost: bool,
    /// Link maximum dividing stored reals of 18-real links.
    pub scale: f64,
    /// FloatN fetch strategy.
    pub access: AccessPath,
}

impl GaugeParam {
    /// Vector field with unit anisotropy, periodic time, one ghost slice.
    #[must_use]
    pub fn new(
        x: [usize; N_DIM],
        precision: Precision,
        order: GaugeFieldOrder,
        reconstruct: Reconstruct,
    ) -> Self {
        Self {
            x,
            precision,
            order,
            reconstruct,
            pad: 0,
            anisotropy: 1.0,
            t_boundary: TBoundary::Periodic,
            n_face: 1,
            geometry: LinkGeometry::Vector,
            separate_ghost: order.is_legacy(),
            scale: 1.0,
            access: AccessPath::Direct,
        }
    }
}

fn unsupported(what: &'static str, value: String) -> HaloError {
    HaloError::Unsupported { what, value }
}

fn check_param<T: StorageReal>(param: &GaugeParam) -> Result<()> {
    if T::PRECISION != param.precision {
        return Err(HaloError::FieldMismatch {
            what: "precision",
            a: T::PRECISION.to_string(),
            b: param.precision.to_string(),
        });
    }
    if param.order.is_legacy() && param.reconstruct != Reconstruct::No {
        return Err(unsupported(
            "reconstruct for legacy order",
            format!("{} with {}", param.reconstruct, param.order),
        ));
    }
    if param.order.is_legacy() && param.precision == Precision::Half {
        return Err(unsupported("legacy order precision", param.precision.to_string()));
    }
    if param.geometry == LinkGeometry::Scalar && param.reconstruct != Reconstruct::No {
        return Err(unsupported("reconstruct for scalar geometry", param.reconstruct.to_string()));
    }
    if param.geometry == LinkGeometry::Scalar && !param.separate_ghost {
        return Err(unsupported("pad ghosts for scalar geometry", param.order.to_string()));
    }
    if param.n_face == 0 {
        return Err(unsupported("ghost depth", "0".into()));
    }
    Ok(())
}

fn float_n_width(precision: Precision, recon_len: usize) -> usize {
    if precision != Precision::Double && recon_len % 4 == 0 {
        4
    } else {
        2
    }
}

/// Gauge links of one order stored as `T`.
#[derive(Debug)]
pub struct GaugeField<T: StorageReal> {
    param: GaugeParam,
    topo: CommTopology,
    cb: Checkerboard,
    volume_cb: usize,
    surface_cb: [usize; N_DIM],
    face_volume_cb: [usize; N_DIM],
    codec: Codec,
    float_n: FloatN,
    ghost_float_n: [FloatN; N_DIM],
    half_elems: usize,
    planes: Vec<Vec<T>>,
    ghost: [Vec<T>; N_DIM],
}

impl<T: StorageReal> GaugeField<T> {
    /// Allocate a zeroed gauge field on the process grid `topo`.
    ///
    /// # Errors
    ///
    /// Unsupported (order, reconstruction, precision, geometry)
    /// combinations, `OddCheckerboard`, `FaceDeeperThanExtent`,
    /// `PadTooSmall` for pad ghosts, or `Allocation`.
    pub fn new(param: &GaugeParam, topo: &CommTopology) -> Result<Self> {
        check_param::<T>(param)?;
        let cb = Checkerboard::new(&param.x)?;
        let volume_cb = cb.volume_cb();
        let n_dir = param.geometry.dirs();

        let mut surface_cb = [0; N_DIM];
        let mut face_volume_cb = [0; N_DIM];
        for d in 0..N_DIM {
            surface_cb[d] = cb.face_volume_cb(d);
            face_volume_cb[d] = surface_cb[d] * param.n_face;
            if topo.partitioned(d) {
                cb.check_face(d)?;
                if param.x[d] < param.n_face {
                    return Err(HaloError::FaceDeeperThanExtent {
                        dim: d,
                        extent: param.x[d],
                        n_face: param.n_face,
                    });
                }
            }
        }

        let recon_len = param.reconstruct.recon_len();
        let n = float_n_width(param.precision, recon_len);
        if param.order == GaugeFieldOrder::FloatN && recon_len % n != 0 {
            return Err(unsupported("FloatN width", format!("{n} for {}", param.reconstruct)));
        }
        let phase = param.reconstruct.has_phase();
        let float_n = FloatN {
            n,
            len: recon_len,
            stride: volume_cb + param.pad,
            phase,
        };
        let ghost_float_n = std::array::from_fn(|d| FloatN {
            n,
            len: recon_len,
            stride: face_volume_cb[d],
            phase,
        });

        let size = std::mem::size_of::<T>();
        let mut half_elems = 0;
        let planes = match param.order {
            GaugeFieldOrder::FloatN => {
                if !param.separate_ghost {
                    let required = (0..N_DIM)
                        .filter(|&d| topo.partitioned(d))
                        .map(|d| face_volume_cb[d])
                        .max()
                        .unwrap_or(0);
                    if param.pad < required {
                        return Err(HaloError::PadTooSmall {
                            pad: param.pad,
                            required,
                        });
                    }
                }
                half_elems = align_up(float_n.half_len(n_dir) * size) / size;
                vec![alloc_zeroed("gauge links", 2 * half_elems)?]
            }
            GaugeFieldOrder::Qdp => (0..n_dir)
                .map(|_| alloc_zeroed("gauge links", 2 * volume_cb * LINK_REALS))
                .collect::<Result<Vec<_>>>()?,
            GaugeFieldOrder::Milc | GaugeFieldOrder::Cps => {
                vec![alloc_zeroed("gauge links", 2 * volume_cb * n_dir * LINK_REALS)?]
            }
            GaugeFieldOrder::Bqcd => vec![alloc_zeroed(
                "gauge links",
                n_dir * 2 * index::bqcd_ex_volume_cb(&param.x) * LINK_REALS,
            )?],
        };

        let mut ghost: [Vec<T>; N_DIM] = Default::default();
        if param.separate_ghost {
            for d in (0..N_DIM).filter(|&d| topo.partitioned(d)) {
                let len = if param.order.is_legacy() {
                    2 * face_volume_cb[d] * LINK_REALS
                } else {
                    2 * ghost_float_n[d].dir_block()
                };
                ghost[d] = alloc_zeroed("gauge ghost", len)?;
            }
        }

        debug!(
            order = %param.order,
            reconstruct = %param.reconstruct,
            precision = %param.precision,
            volume_cb,
            ?face_volume_cb,
            "gauge field"
        );

        Ok(Self {
            param: param.clone(),
            topo: topo.clone(),
            cb,
            volume_cb,
            surface_cb,
            face_volume_cb,
            codec: Codec::new(param.reconstruct, param.precision, param.scale),
            float_n,
            ghost_float_n,
            half_elems,
            planes,
            ghost,
        })
    }

    /// Descriptor.
    #[must_use]
    pub const fn param(&self) -> &GaugeParam {
        &self.param
    }

    /// Process grid position.
    #[must_use]
    pub const fn topology(&self) -> &CommTopology {
        &self.topo
    }

    /// Local geometry.
    #[must_use]
    pub const fn checkerboard(&self) -> &Checkerboard {
        &self.cb
    }

    /// Sites per parity.
    #[must_use]
    pub const fn volume_cb(&self) -> usize {
        self.volume_cb
    }

    /// Directions stored per site.
    #[must_use]
    pub const fn n_dir(&self) -> usize {
        self.param.geometry.dirs()
    }

    /// Checkerboarded sites in one slice of dimension `d`.
    #[must_use]
    pub const fn surface_cb(&self, d: usize) -> usize {
        self.surface_cb[d]
    }

    /// Ghost links per parity of dimension `d` (`n_face` slices).
    #[must_use]
    pub const fn face_volume_cb(&self, d: usize) -> usize {
        self.face_volume_cb[d]
    }

    /// Codec in use.
    #[must_use]
    pub const fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Raw storage planes (one per direction for QDP, else one).
    #[must_use]
    pub fn planes(&self) -> &[Vec<T>] {
        &self.planes
    }

    /// Global time slice of checkerboard site `x`.
    #[must_use]
    pub fn global_t(&self, x: usize) -> usize {
        let spatial_cb = self.param.x[0] * self.param.x[1] * self.param.x[2] / 2;
        self.topo.global_offset(3, self.param.x[3]) + x / spatial_cb
    }

    fn boundary_u0(&self, global_t: usize) -> f64 {
        if global_t + 1 == self.topo.global_extent(3, self.param.x[3]) {
            self.param.t_boundary.sign()
        } else {
            1.0
        }
    }

    /// `u0` used to reconstruct the link at `(x, dir)`.
    #[must_use]
    pub fn u0(&self, x: usize, dir: usize) -> f64 {
        if dir < 3 {
            self.param.anisotropy
        } else {
            self.boundary_u0(self.global_t(x))
        }
    }

    /// `u0` of ghost link `x` of dimension `dir`: the ghost slices are the
    /// backward neighbor's last `n_face` slices.
    #[must_use]
    pub fn ghost_u0(&self, x: usize, dir: usize) -> f64 {
        if dir < 3 {
            return self.param.anisotropy;
        }
        let t_global = self.topo.global_extent(3, self.param.x[3]);
        let k = x / self.surface_cb[3].max(1);
        let t = (self.topo.global_offset(3, self.param.x[3]) + t_global + k - self.param.n_face) % t_global;
        self.boundary_u0(t)
    }

    fn legacy_index(&self, x: usize, dir: usize, parity: usize, r: usize) -> usize {
        let vcb = self.volume_cb;
        let nd = self.n_dir();
        match self.param.order {
            GaugeFieldOrder::Qdp => index::qdp(x, parity, vcb, r),
            GaugeFieldOrder::Milc => index::milc(x, dir, parity, vcb, nd, r),
            GaugeFieldOrder::Cps => index::cps(x, dir, parity, vcb, nd, r),
            GaugeFieldOrder::Bqcd => index::bqcd(x, dir, parity, index::bqcd_ex_volume_cb(&self.param.x), r),
            GaugeFieldOrder::FloatN => self.float_n.element(dir, x, r),
        }
    }

    fn legacy_plane(&self, dir: usize) -> usize {
        if self.param.order == GaugeFieldOrder::Qdp {
            dir
        } else {
            0
        }
    }

    fn legacy_scale(&self) -> f64 {
        if self.param.order == GaugeFieldOrder::Cps {
            self.param.anisotropy
        } else {
            1.0
        }
    }

    fn fetch_float_n(&self, buf: &[T], base: usize, idx: &FloatN, dir: usize, x: usize, u0: f64) -> Link {
        let len = idx.len;
        let mut packed = [0.0; LINK_REALS];
        self.param.access.fetch(buf, base, idx, dir, x, &mut packed[..len]);
        let phase = if idx.phase {
            buf[base + idx.phase(dir, x)].to_reg()
        } else {
            0.0
        };
        self.codec.unpack(&packed[..len], phase, u0)
    }

    fn store_float_n(codec: &Codec, buf: &mut [T], base: usize, idx: &FloatN, dir: usize, x: usize, u0: f64, link: &Link) {
        let mut packed = [0.0; LINK_REALS];
        let phase = codec.pack(link, u0, &mut packed[..idx.len]);
        scatter(buf, 1.0, |i| base + idx.element(dir, x, i), &packed[..idx.len]);
        if idx.phase {
            buf[base + idx.phase(dir, x)] = T::from_reg(phase);
        }
    }

    /// Overwrite every link with `f(coords, dir, parity)`.
    pub fn fill_with<F>(&mut self, mut f: F)
    where
        F: FnMut(&Coords, usize, usize) -> Link,
    {
        for parity in 0..2 {
            for x in 0..self.volume_cb {
                let c = self.cb.coords(x, parity);
                for dir in 0..self.n_dir() {
                    let link = f(&c, dir, parity);
                    self.save(&link, x, dir, parity);
                }
            }
        }
    }
}

impl<T: StorageReal> GaugeOrder for GaugeField<T> {
    fn load(&self, x: usize, dir: usize, parity: usize) -> Link {
        if self.param.order == GaugeFieldOrder::FloatN {
            return self.fetch_float_n(
                &self.planes[0],
                parity * self.half_elems,
                &self.float_n,
                dir,
                x,
                self.u0(x, dir),
            );
        }
        let mut link = [0.0; LINK_REALS];
        gather(
            &self.planes[self.legacy_plane(dir)],
            1.0 / self.legacy_scale(),
            |r| self.legacy_index(x, dir, parity, r),
            &mut link,
        );
        link
    }

    fn save(&mut self, link: &Link, x: usize, dir: usize, parity: usize) {
        if self.param.order == GaugeFieldOrder::FloatN {
            let u0 = self.u0(x, dir);
            let base = parity * self.half_elems;
            Self::store_float_n(&self.codec, &mut self.planes[0], base, &self.float_n, dir, x, u0, link);
            return;
        }
        let plane = self.legacy_plane(dir);
        let scale = self.legacy_scale();
        // moved out so the index map can borrow the rest of `self`
        let mut buf = std::mem::take(&mut self.planes[plane]);
        scatter(&mut buf, scale, |r| self.legacy_index(x, dir, parity, r), link);
        self.planes[plane] = buf;
    }

    fn load_ghost(&self, x: usize, dir: usize, parity: usize) -> Link {
        let u0 = self.ghost_u0(x, dir);
        if self.param.order.is_legacy() {
            let mut link = [0.0; LINK_REALS];
            let fvcb = self.face_volume_cb[dir];
            gather(&self.ghost[dir], 1.0, |r| index::legacy_ghost(x, parity, fvcb, r), &mut link);
            link
        } else if self.param.separate_ghost {
            let idx = &self.ghost_float_n[dir];
            self.fetch_float_n(&self.ghost[dir], parity * idx.dir_block(), idx, 0, x, u0)
        } else {
            self.fetch_float_n(
                &self.planes[0],
                parity * self.half_elems,
                &self.float_n,
                dir,
                x + self.volume_cb,
                u0,
            )
        }
    }

    fn save_ghost(&mut self, link: &Link, x: usize, dir: usize, parity: usize) {
        let u0 = self.ghost_u0(x, dir);
        if self.param.order.is_legacy() {
            let fvcb = self.face_volume_cb[dir];
            scatter(&mut self.ghost[dir], 1.0, |r| index::legacy_ghost(x, parity, fvcb, r), link);
        } else if self.param.separate_ghost {
            let idx = self.ghost_float_n[dir];
            Self::store_float_n(&self.codec, &mut self.ghost[dir], parity * idx.dir_block(), &idx, 0, x, u0, link);
        } else {
            let base = parity * self.half_elems;
            let x = x + self.volume_cb;
            Self::store_float_n(&self.codec, &mut self.planes[0], base, &self.float_n, dir, x, u0, link);
        }
    }
}
