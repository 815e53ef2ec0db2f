use super::BinNo;

/// Size-class policy consumed by the cache.
///
/// Maps object sizes to bin numbers and back. The cache uses it to size its
/// per-shard queue tables, to derive the largest cacheable bin from the
/// per-bin byte budget, and to compute byte footprints on the insert path.
pub trait BinPolicy {
    /// Total number of bins the policy defines. Shard queue tables are sized
    /// to this; it may exceed the cacheable range.
    fn num_bins() -> usize;

    /// Smallest bin whose object size holds `object_size`, or `None` if the
    /// size exceeds the largest class.
    fn bin_of(object_size: usize) -> Option<BinNo>;

    /// Object size served by `bin_no`.
    ///
    /// # Panics
    ///
    /// Panics if `bin_no >= num_bins()`.
    fn object_size_of(bin_no: BinNo) -> usize;
}

/// Default segregated-fit policy.
///
/// 44 classes: 16B..128B in 16-byte steps, then progressively coarser steps
/// doubling up to 64KB. Lookup is O(1) through a const-built table indexed
/// by 16-byte quanta.
pub struct SegregatedPolicy;

pub(crate) const SIZE_CLASSES: &[usize] = &[
    16, 32, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 640, 768, 896, 1024,
    1280, 1536, 1792, 2048, 2560, 3072, 3584, 4096, 5120, 6144, 7168, 8192, 10240, 12288, 14336,
    16384, 20480, 24576, 28672, 32768, 40960, 49152, 57344, 65536,
];

/// O(1) size-to-class lookup table. Index by `ceil(size / 16)`.
/// Table has 4097 entries covering sizes 1..65536 in 16-byte quanta.
/// Each entry is the size class index (0..43).
static SIZE_CLASS_LUT: [u8; 4097] = build_size_class_lut();

const fn build_size_class_lut() -> [u8; 4097] {
    // Duplicate SIZE_CLASSES as a fixed array for const evaluation
    const CLASSES: [usize; 44] = [
        16, 32, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 640, 768, 896,
        1024, 1280, 1536, 1792, 2048, 2560, 3072, 3584, 4096, 5120, 6144, 7168, 8192, 10240, 12288,
        14336, 16384, 20480, 24576, 28672, 32768, 40960, 49152, 57344, 65536,
    ];
    let mut table = [0u8; 4097];
    // table[0] unused (size 0 maps through quantum 1)
    let mut q: usize = 1;
    let mut sc: u8 = 0;
    while sc < 44 {
        let class_quanta = CLASSES[sc as usize] / 16;
        while q <= class_quanta {
            table[q] = sc;
            q += 1;
        }
        sc += 1;
    }
    table
}

impl BinPolicy for SegregatedPolicy {
    fn num_bins() -> usize {
        SIZE_CLASSES.len()
    }

    fn bin_of(object_size: usize) -> Option<BinNo> {
        if object_size > SIZE_CLASSES[SIZE_CLASSES.len() - 1] {
            return None;
        }
        let quanta = (object_size.max(1) + 15) >> 4;
        Some(SIZE_CLASS_LUT[quanta] as BinNo)
    }

    fn object_size_of(bin_no: BinNo) -> usize {
        SIZE_CLASSES[bin_no]
    }
}
