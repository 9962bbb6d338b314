use std::fs::File;
use std::io::{ BufRead, BufReader };
use std::path::Path;

use log::{ debug, warn };

use crate::error::{ Result, TracerError };
use crate::shape::{ Shape, ShapeId, Shapes };
use crate::tuple::Tuple4D;

/// One corner of a face: a vertex index and an optional normal index, both
/// zero-based once parsed.
type FaceVertex = (usize, Option<usize>);

/// A parser for Wavefront OBJ meshes.
///
/// Only the geometry the tracer can draw is read: `v` (vertices), `vn`
/// (vertex normals), `f` (polygonal faces) and `g` (named groups). Every other
/// non-blank line is skipped and counted in `ignored_lines`.
#[derive(Debug)]
pub struct ObjParser {
    pub ignored_lines: usize,

    pub vertices: Vec<Tuple4D>,
    pub normals: Vec<Tuple4D>,

    /// Triangles by group, in the order groups first appear. The unnamed
    /// default group is always first.
    groups: Vec<(String, Vec<Shape>)>,
    current: usize,
}

impl Default for ObjParser {
    fn default() -> ObjParser {
        ObjParser::new()
    }
}

impl ObjParser {
    pub fn new() -> ObjParser {
        ObjParser {
            ignored_lines: 0,
            vertices: Vec::new(),
            normals: Vec::new(),
            groups: vec![(String::new(), Vec::new())],
            current: 0,
        }
    }

    /// Parses the OBJ file at `path`.
    pub fn parse_file(path: &Path) -> Result<ObjParser> {
        let mut parser = ObjParser::new();
        parser.parse(BufReader::new(File::open(path)?))?;

        debug!("parsed {:?}: {} vertices, {} normals, {} groups",
               path, parser.vertices.len(), parser.normals.len(), parser.groups.len());
        Ok(parser)
    }

    /// Parses OBJ text from any buffered reader.
    ///
    /// A sample OBJ file may look like the following:
    ///
    /// ```obj
    /// v -1 1 0
    /// v -1 0 0
    /// v 1 0 0
    /// v 1 1 0
    ///
    /// g FirstGroup
    /// f 1 2 3
    /// g SecondGroup
    /// f 1 3 4
    /// ```
    ///
    /// Groups do not nest; `SecondGroup` above is a sibling of `FirstGroup`.
    pub fn parse<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for (n, line) in reader.lines().enumerate() {
            self.parse_line(n + 1, &line?)?;
        }

        if self.ignored_lines > 0 {
            warn!("ignored {} unrecognized OBJ lines", self.ignored_lines);
        }
        Ok(())
    }

    fn parse_line(&mut self, n: usize, line: &str) -> Result<()> {
        let mut params = line.split_whitespace();
        let command = match params.next() {
            Some(command) => command,
            None => return Ok(()),
        };
        let args: Vec<&str> = params.collect();

        match command {
            "v" => {
                let [x, y, z] = parse_triple(n, &args)?;
                self.vertices.push(Tuple4D::point(x, y, z));
            },

            "vn" => {
                let [x, y, z] = parse_triple(n, &args)?;
                self.normals.push(Tuple4D::vector(x, y, z));
            },

            "f" => {
                if args.len() < 3 {
                    return Err(obj_error(n, "a face needs at least three vertices"));
                }

                let face = args.iter()
                    .map(|a| self.parse_face_vertex(n, a))
                    .collect::<Result<Vec<_>>>()?;

                let triangles = self.fan_triangulation(&face);
                self.groups[self.current].1.extend(triangles);
            },

            "g" => {
                let name = match args.first() {
                    Some(name) => *name,
                    None => {
                        self.ignored_lines += 1;
                        return Ok(());
                    },
                };

                self.current = match self.groups.iter().position(|(g, _)| g == name) {
                    Some(i) => i,
                    None => {
                        self.groups.push((name.to_string(), Vec::new()));
                        self.groups.len() - 1
                    },
                };
            },

            _ => self.ignored_lines += 1,
        }

        Ok(())
    }

    /// Parses `v`, `v/vt`, `v//vn` or `v/vt/vn`. Texture indices are
    /// accepted and dropped.
    fn parse_face_vertex(&self, n: usize, token: &str) -> Result<FaceVertex> {
        let mut attributes = token.split('/');

        let vertex = match attributes.next() {
            Some(v) => parse_index(n, v, self.vertices.len(), "vertex")?,
            None => return Err(obj_error(n, "empty face vertex")),
        };

        let normal = match attributes.nth(1) {
            Some(vn) if !vn.is_empty() => {
                Some(parse_index(n, vn, self.normals.len(), "normal")?)
            },
            _ => None,
        };

        Ok((vertex, normal))
    }

    /// Splits a convex polygon into triangles sharing its first vertex.
    ///
    /// ```text
    ///         B *
    ///          / \
    ///         /   \
    ///     A *       * C
    ///       |       |
    ///     E * ----- * D
    /// ```
    ///
    /// The face `A B C D E` above becomes `A-B-C`, `A-C-D` and `A-D-E`. A
    /// triangle is smooth when all three of its corners carry normals.
    fn fan_triangulation(&self, face: &[FaceVertex]) -> Vec<Shape> {
        let mut triangles = Vec::with_capacity(face.len() - 2);

        for i in 1..(face.len() - 1) {
            let (a, b, c) = (face[0], face[i], face[i + 1]);
            let (p1, p2, p3) = (self.vertices[a.0], self.vertices[b.0], self.vertices[c.0]);

            let triangle = match (a.1, b.1, c.1) {
                (Some(n1), Some(n2), Some(n3)) => Shape::smooth_triangle(
                    p1, p2, p3,
                    self.normals[n1], self.normals[n2], self.normals[n3]
                ),
                _ => Shape::triangle(p1, p2, p3),
            };
            triangles.push(triangle);
        }

        triangles
    }

    /// The triangles read into group `name`; `""` is the default group.
    pub fn group(&self, name: &str) -> Option<&[Shape]> {
        self.groups.iter()
            .find(|(g, _)| g == name)
            .map(|(_, triangles)| triangles.as_slice())
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(g, _)| g.as_str())
    }

    /// Moves the mesh into `shapes` as one group.
    ///
    /// Triangles of the default group become direct children; each named
    /// group becomes a child group of its own. Empty named groups are
    /// dropped.
    pub fn into_group(self, shapes: &mut Shapes) -> Result<ShapeId> {
        let root = shapes.add(Shape::group());

        for (name, triangles) in self.groups {
            if triangles.is_empty() {
                continue;
            }

            let parent = if name.is_empty() {
                root
            } else {
                let g = shapes.add(Shape::group());
                shapes.add_child(root, g)?;
                g
            };

            for triangle in triangles {
                let t = shapes.add(triangle);
                shapes.add_child(parent, t)?;
            }
        }

        Ok(root)
    }
}

fn obj_error(line: usize, message: impl Into<String>) -> TracerError {
    TracerError::Obj { line, message: message.into() }
}

fn parse_triple(n: usize, args: &[&str]) -> Result<[f64; 3]> {
    if args.len() < 3 {
        return Err(obj_error(n, format!("expected 3 coordinates, found {}", args.len())));
    }

    let mut xyz = [0.0; 3];
    for (value, arg) in xyz.iter_mut().zip(args.iter()) {
        *value = arg.parse().map_err(|_| obj_error(n, format!("bad number {:?}", arg)))?;
    }

    Ok(xyz)
}

/// Converts a one-based OBJ index into a zero-based one, checking it against
/// the number of records seen so far.
fn parse_index(n: usize, token: &str, count: usize, what: &str) -> Result<usize> {
    let index: usize = token.parse()
        .map_err(|_| obj_error(n, format!("bad {} index {:?}", what, token)))?;

    if index == 0 || index > count {
        return Err(obj_error(n, format!("{} index {} out of range", what, index)));
    }

    Ok(index - 1)
}

#[cfg(test)]
use crate::shape::ShapeType;

#[cfg(test)]
fn parse_str(text: &str) -> ObjParser {
    let mut parser = ObjParser::new();
    parser.parse(text.as_bytes()).unwrap();
    parser
}

#[cfg(test)]
fn corners(shape: &Shape) -> (Tuple4D, Tuple4D, Tuple4D) {
    match shape.ty() {
        ShapeType::Triangle(t) => (t.p1, t.p2, t.p3),
        ShapeType::SmoothTriangle(s) => {
            (s.triangle_info.p1, s.triangle_info.p2, s.triangle_info.p3)
        },
        other => panic!("expected a triangle, got {:?}", other),
    }
}

#[test]
fn ignoring_unrecognized_lines() {
    let parser = parse_str(
        "There was a young lady named Bright\n\
         who traveled much faster than light.\n\
         She set out one day\n\
         in a relative way,\n\
         and came back the previous night.\n"
    );

    assert_eq!(parser.ignored_lines, 5);
    assert!(parser.vertices.is_empty());
}

#[test]
fn vertex_records() {
    let parser = parse_str("v -1 1 0\nv -1.0000 0.5000 0.0000\nv 1 0 0\nv 1 1 0\n");

    assert_eq!(parser.vertices[0], Tuple4D::point(-1.0, 1.0, 0.0));
    assert_eq!(parser.vertices[1], Tuple4D::point(-1.0, 0.5, 0.0));
    assert_eq!(parser.vertices[2], Tuple4D::point( 1.0, 0.0, 0.0));
    assert_eq!(parser.vertices[3], Tuple4D::point( 1.0, 1.0, 0.0));
    assert_eq!(parser.ignored_lines, 0);
}

#[test]
fn parsing_triangle_faces() {
    let parser = parse_str("v -1 1 0\nv -1 0 0\nv 1 0 0\nv 1 1 0\n\nf 1 2 3\nf 1 3 4\n");
    let triangles = parser.group("").unwrap();
    let v = &parser.vertices;

    assert_eq!(triangles.len(), 2);
    assert_eq!(corners(&triangles[0]), (v[0], v[1], v[2]));
    assert_eq!(corners(&triangles[1]), (v[0], v[2], v[3]));
}

#[test]
fn triangulating_polygons() {
    let parser = parse_str(
        "v -1 1 0\nv -1 0 0\nv 1 0 0\nv 1 1 0\nv 0 2 0\n\nf 1 2 3 4 5\n"
    );
    let triangles = parser.group("").unwrap();
    let v = &parser.vertices;

    assert_eq!(triangles.len(), 3);
    assert_eq!(corners(&triangles[0]), (v[0], v[1], v[2]));
    assert_eq!(corners(&triangles[1]), (v[0], v[2], v[3]));
    assert_eq!(corners(&triangles[2]), (v[0], v[3], v[4]));
}

#[test]
fn triangles_in_groups() {
    let parser = parse_str(
        "v -1 1 0\nv -1 0 0\nv 1 0 0\nv 1 1 0\n\
         g FirstGroup\nf 1 2 3\ng SecondGroup\nf 1 3 4\n"
    );
    let v = &parser.vertices;

    assert_eq!(parser.group_names().collect::<Vec<_>>(), vec!["", "FirstGroup", "SecondGroup"]);
    assert_eq!(corners(&parser.group("FirstGroup").unwrap()[0]), (v[0], v[1], v[2]));
    assert_eq!(corners(&parser.group("SecondGroup").unwrap()[0]), (v[0], v[2], v[3]));
}

#[test]
fn converting_obj_to_group() {
    let parser = parse_str(
        "v -1 1 0\nv -1 0 0\nv 1 0 0\nv 1 1 0\n\
         f 1 2 4\ng FirstGroup\nf 1 2 3\ng SecondGroup\nf 1 3 4\ng Empty\n"
    );

    let mut shapes = Shapes::new();
    let root = parser.into_group(&mut shapes).unwrap();
    let children = shapes.children(root).to_vec();

    // One loose triangle, then one subgroup per non-empty named group.
    assert_eq!(children.len(), 3);
    assert!(!shapes[children[0]].is_group());
    assert_eq!(shapes.children(children[1]).len(), 1);
    assert_eq!(shapes.children(children[2]).len(), 1);
    assert_eq!(shapes[children[2]].parent(), Some(root));
}

#[test]
fn vertex_normal_records() {
    let parser = parse_str("vn 0 0 1\nvn 0.707 0 -0.707\nvn 1 2 3\n");

    assert_eq!(parser.normals[0], Tuple4D::vector(0.0, 0.0, 1.0));
    assert_eq!(parser.normals[1], Tuple4D::vector(0.707, 0.0, -0.707));
    assert_eq!(parser.normals[2], Tuple4D::vector(1.0, 2.0, 3.0));
}

#[test]
fn faces_with_normals() {
    let parser = parse_str(
        "v 0 1 0\nv -1 0 0\nv 1 0 0\n\
         vn -1 0 0\nvn 1 0 0\nvn 0 1 0\n\
         f 1//3 2//1 3//2\nf 1/0/3 2/102/1 3/14/2\n"
    );
    let triangles = parser.group("").unwrap();

    for t in triangles {
        match t.ty() {
            ShapeType::SmoothTriangle(s) => {
                assert_eq!(s.triangle_info.p1, parser.vertices[0]);
                assert_eq!(s.triangle_info.p2, parser.vertices[1]);
                assert_eq!(s.triangle_info.p3, parser.vertices[2]);
                assert_eq!(s.n1, parser.normals[2]);
                assert_eq!(s.n2, parser.normals[0]);
                assert_eq!(s.n3, parser.normals[1]);
            },
            other => panic!("expected a smooth triangle, got {:?}", other),
        }
    }
    assert_eq!(triangles[0].ty(), triangles[1].ty());
}

#[test]
fn malformed_numbers_are_errors() {
    let mut parser = ObjParser::new();
    let err = parser.parse("v 1 2 3\nv 1 two 3\n".as_bytes()).unwrap_err();

    match err {
        TracerError::Obj { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn out_of_range_faces_are_errors() {
    let mut parser = ObjParser::new();
    let result = parser.parse("v 0 0 0\nv 1 0 0\nf 1 2 3\n".as_bytes());

    assert!(matches!(result, Err(TracerError::Obj { line: 3, .. })));
}

#[test]
fn default_parser_reads_faces() {
    let mut parser = ObjParser::default();
    parser.parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".as_bytes()).unwrap();

    assert_eq!(parser.group("").map(|t| t.len()), Some(1));
}
