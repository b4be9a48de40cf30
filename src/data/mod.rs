/// Data layer: core types, loading, and reduction.
///
/// Architecture:
/// ```text
///  StageTable.csv + {step}-{1|2|3}.mca        Counts .csv / .json / .parquet
///        │                                            │
///        ▼                                            ▼
///   ┌──────────┐                               ┌──────────┐
///   │  loader   │  raw records                 │  loader   │  NamedSpectrum
///   └──────────┘                               └──────────┘
///        │                                            │
///        ▼                                            ▼
///   ┌──────────┐  trim, sum detectors,         ┌──────────┐  window, peaks,
///   │  raster   │  mean, windowed sum,         │  session  │  sums, average,
///   └──────────┘  reshape → Matrix             └──────────┘  progression
///                      ╲                          ╱
///                       └──────  search  ────────┘
/// ```

pub mod error;
pub mod loader;
pub mod model;
pub mod raster;
pub mod search;
pub mod session;
